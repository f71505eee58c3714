use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::backend::inactivity::{InactivityCheckBackend, InactivityOpts};
use crate::backend::scheduler::{DelayedScheduler, ThreadScheduler};
use crate::backend::{AnimationInformation, BitmapAnimationBackend, FrameRenderer};
use crate::bitmap::allocator::{BitmapAllocator, HeapAllocatorOpts, HeapBitmapAllocator};
use crate::cache::{
    AnimatedFrameStore, BitmapFrameCache, FrameStoreOpts, KeepLastFrameCache, NoOpCache,
    PooledFrameCache,
};
use crate::foundation::clock::{MonotonicClock, SystemClock};
use crate::foundation::core::{AnimationKey, PixelFormat};
use crate::foundation::error::{AnimError, AnimResult};
use crate::prepare::executor::{FrameExecutor, RayonExecutor};
use crate::prepare::preparer::DefaultBitmapFramePreparer;
use crate::prepare::strategy::{DEFAULT_FRAMES_TO_PREPARE, FixedNumberFramePreparationStrategy};

/// Which [`BitmapFrameCache`] new animations get.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CachingStrategy {
    /// [`NoOpCache`].
    #[default]
    NoCache,
    /// [`PooledFrameCache`] over the factory's shared store, with buffer reuse.
    SharedPool,
    /// [`PooledFrameCache`] over the factory's shared store, without buffer reuse.
    SharedPoolNoReuse,
    /// [`KeepLastFrameCache`].
    KeepLast,
}

impl CachingStrategy {
    /// Map a legacy numeric strategy code. Unknown codes fall back to [`CachingStrategy::NoCache`].
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => Self::SharedPool,
            2 => Self::SharedPoolNoReuse,
            3 => Self::KeepLast,
            _ => Self::NoCache,
        }
    }
}

/// Configuration of an [`AnimationFactory`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationOpts {
    /// Frame cache for new animations.
    pub caching_strategy: CachingStrategy,
    /// Frames to prepare ahead of the one drawn. 0 disables preparation.
    pub frames_to_prepare: usize,
    /// Preparation worker threads; `None` uses rayon's default.
    pub preparer_threads: Option<usize>,
    /// Idle time after the last draw before an animation releases its frames.
    pub inactivity_threshold_ms: u64,
    /// Interval between inactivity checks.
    pub inactivity_polling_ms: u64,
    /// Byte bound of the shared frame store.
    pub pool_max_bytes: usize,
    /// Entry bound of the shared frame store.
    pub pool_max_entries: usize,
    /// Byte budget for live frame bitmaps; `None` is unbounded.
    pub allocator_max_bytes: Option<u64>,
    /// Pixel format of frame bitmaps.
    pub pixel_format: PixelFormat,
}

impl Default for AnimationOpts {
    fn default() -> Self {
        let inactivity = InactivityOpts::default();
        let store = FrameStoreOpts::default();
        Self {
            caching_strategy: CachingStrategy::default(),
            frames_to_prepare: DEFAULT_FRAMES_TO_PREPARE,
            preparer_threads: None,
            inactivity_threshold_ms: inactivity.threshold_ms,
            inactivity_polling_ms: inactivity.polling_ms,
            pool_max_bytes: store.max_bytes,
            pool_max_entries: store.max_entries,
            allocator_max_bytes: None,
            pixel_format: PixelFormat::default(),
        }
    }
}

impl AnimationOpts {
    /// Parse options from JSON. Missing fields take their defaults.
    pub fn from_json_str(s: &str) -> AnimResult<Self> {
        let opts: Self = serde_json::from_str(s)
            .map_err(|e| AnimError::config(format!("invalid animation options: {e}")))?;
        opts.validate()?;
        Ok(opts)
    }

    /// Check option ranges.
    pub fn validate(&self) -> AnimResult<()> {
        if self.preparer_threads == Some(0) {
            return Err(AnimError::validation(
                "preparer_threads must be >= 1 when set",
            ));
        }
        if self.pool_max_bytes == 0 || self.pool_max_entries == 0 {
            return Err(AnimError::validation(
                "pool_max_bytes and pool_max_entries must be > 0",
            ));
        }
        self.inactivity().validate()
    }

    /// Watchdog timing.
    pub fn inactivity(&self) -> InactivityOpts {
        InactivityOpts {
            threshold_ms: self.inactivity_threshold_ms,
            polling_ms: self.inactivity_polling_ms,
        }
    }

    /// Shared frame store limits.
    pub fn store(&self) -> FrameStoreOpts {
        FrameStoreOpts {
            max_bytes: self.pool_max_bytes,
            max_entries: self.pool_max_entries,
        }
    }
}

/// Animation backend produced by [`AnimationFactory::create_backend`].
pub type AnimatedBackend = InactivityCheckBackend<BitmapAnimationBackend>;

/// Collaborators shared by every animation a factory creates.
pub struct FactoryParts {
    /// Bitmap source for preparation and on-demand rendering.
    pub allocator: Arc<dyn BitmapAllocator>,
    /// Worker pool for preparation jobs.
    pub executor: Arc<dyn FrameExecutor>,
    /// Clock for the inactivity watchdog.
    pub clock: Arc<dyn MonotonicClock>,
    /// Timer for the inactivity watchdog.
    pub scheduler: Arc<dyn DelayedScheduler>,
}

/// Builds animation backends from [`AnimationOpts`].
///
/// All animations share one allocator, one worker pool, one watchdog timer and, for the pooled
/// strategies, one [`AnimatedFrameStore`].
pub struct AnimationFactory {
    opts: AnimationOpts,
    parts: FactoryParts,
    store: Arc<AnimatedFrameStore>,
}

impl AnimationFactory {
    /// Create a factory with a heap allocator, a rayon worker pool, the system clock and a timer
    /// thread.
    pub fn new(opts: AnimationOpts) -> AnimResult<Self> {
        opts.validate()?;
        let parts = FactoryParts {
            allocator: Arc::new(HeapBitmapAllocator::new(HeapAllocatorOpts {
                max_live_bytes: opts.allocator_max_bytes,
            })),
            executor: Arc::new(RayonExecutor::new(opts.preparer_threads)?),
            clock: Arc::new(SystemClock::new()),
            scheduler: Arc::new(ThreadScheduler::new()?),
        };
        Self::with_parts(opts, parts)
    }

    /// Create a factory around caller-supplied collaborators.
    pub fn with_parts(opts: AnimationOpts, parts: FactoryParts) -> AnimResult<Self> {
        opts.validate()?;
        let store = Arc::new(AnimatedFrameStore::new(opts.store()));
        Ok(Self { opts, parts, store })
    }

    /// Factory options.
    pub fn opts(&self) -> &AnimationOpts {
        &self.opts
    }

    /// The shared frame store.
    pub fn store(&self) -> &Arc<AnimatedFrameStore> {
        &self.store
    }

    /// Build the backend stack for one animation.
    ///
    /// `source` identifies the animation in the shared store; two backends created from the same
    /// source share their pooled frames.
    #[tracing::instrument(
        skip(self, info, renderer),
        fields(strategy = ?self.opts.caching_strategy)
    )]
    pub fn create_backend(
        &self,
        source: &str,
        info: AnimationInformation,
        renderer: Arc<dyn FrameRenderer>,
    ) -> AnimResult<Arc<AnimatedBackend>> {
        if info.frame_count == 0 {
            return Err(AnimError::validation("animation must have at least one frame"));
        }
        let cache = self.create_frame_cache(AnimationKey::from_source(source));

        let mut backend = BitmapAnimationBackend::new(
            Arc::clone(&self.parts.allocator),
            cache,
            info,
            Arc::clone(&renderer),
        )
        .with_format(self.opts.pixel_format);
        if self.opts.frames_to_prepare > 0 {
            let preparer = DefaultBitmapFramePreparer::new(
                Arc::clone(&self.parts.allocator),
                renderer,
                self.opts.pixel_format,
                Arc::clone(&self.parts.executor),
            );
            backend = backend.with_preparation(
                Arc::new(FixedNumberFramePreparationStrategy::new(
                    self.opts.frames_to_prepare,
                )),
                Arc::new(preparer),
            );
        }

        let backend = Arc::new(backend);
        let delegate = InactivityCheckBackend::new(
            Arc::clone(&backend),
            Arc::clone(&self.parts.clock),
            Arc::clone(&self.parts.scheduler),
            self.opts.inactivity(),
        )?;
        delegate.set_inactivity_listener(Some(backend));
        tracing::debug!("created animation backend");
        Ok(Arc::new(delegate))
    }

    fn create_frame_cache(&self, key: AnimationKey) -> Arc<dyn BitmapFrameCache> {
        match self.opts.caching_strategy {
            CachingStrategy::NoCache => Arc::new(NoOpCache::new()),
            CachingStrategy::SharedPool => {
                Arc::new(PooledFrameCache::new(Arc::clone(&self.store), key, true))
            }
            CachingStrategy::SharedPoolNoReuse => {
                Arc::new(PooledFrameCache::new(Arc::clone(&self.store), key, false))
            }
            CachingStrategy::KeepLast => Arc::new(KeepLastFrameCache::new()),
        }
    }
}

#[cfg(test)]
#[path = "../tests/unit/factory.rs"]
mod tests;
