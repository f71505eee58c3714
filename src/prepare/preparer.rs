use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::backend::{AnimationBackend, FrameRenderer};
use crate::bitmap::allocator::BitmapAllocator;
use crate::bitmap::handle::FrameHandle;
use crate::cache::BitmapFrameCache;
use crate::foundation::core::{BackendId, FrameType, PixelFormat};
use crate::prepare::executor::FrameExecutor;

/// Renders frames ahead of playback.
pub trait BitmapFramePreparer: Send + Sync {
    /// Make sure `frame` of `backend` ends up in `cache` without blocking the caller.
    ///
    /// Returns `true` when the frame is cached, already being prepared, or a job was submitted.
    /// `true` is not a completion signal.
    fn prepare_frame(
        &self,
        cache: &Arc<dyn BitmapFrameCache>,
        backend: &dyn AnimationBackend,
        frame: u32,
    ) -> bool;
}

/// Identity of a preparation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobKey {
    /// Backend the frame belongs to.
    pub backend: BackendId,
    /// Frame number.
    pub frame: u32,
}

/// Preparer counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PreparerStats {
    /// Jobs handed to the executor.
    pub submitted: u64,
    /// Requests answered by an already pending job.
    pub deduplicated: u64,
    /// Requests or jobs that found the frame already cached.
    pub already_cached: u64,
    /// Jobs that rendered and cached their frame.
    pub prepared: u64,
    /// Jobs that gave up.
    pub failed: u64,
}

#[derive(Default)]
struct Counters {
    submitted: AtomicU64,
    deduplicated: AtomicU64,
    already_cached: AtomicU64,
    prepared: AtomicU64,
    failed: AtomicU64,
}

struct Shared {
    allocator: Arc<dyn BitmapAllocator>,
    renderer: Arc<dyn FrameRenderer>,
    format: PixelFormat,
    pending: Mutex<HashSet<JobKey>>,
    counters: Counters,
}

/// Removes a job from the pending set on every exit path, including unwinding.
struct PendingGuard<'a> {
    pending: &'a Mutex<HashSet<JobKey>>,
    key: JobKey,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending.lock().remove(&self.key);
    }
}

struct FrameJob {
    shared: Arc<Shared>,
    cache: Arc<dyn BitmapFrameCache>,
    key: JobKey,
    width: u32,
    height: u32,
}

/// Preparer that runs one job per `(backend, frame)` on a [`FrameExecutor`].
///
/// A job first asks the cache for a reusable buffer and falls back to a fresh allocation when none
/// is available or rendering into it fails. Failures are logged and leave the frame uncached.
pub struct DefaultBitmapFramePreparer {
    shared: Arc<Shared>,
    executor: Arc<dyn FrameExecutor>,
}

impl DefaultBitmapFramePreparer {
    /// Create a preparer.
    pub fn new(
        allocator: Arc<dyn BitmapAllocator>,
        renderer: Arc<dyn FrameRenderer>,
        format: PixelFormat,
        executor: Arc<dyn FrameExecutor>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                allocator,
                renderer,
                format,
                pending: Mutex::new(HashSet::new()),
                counters: Counters::default(),
            }),
            executor,
        }
    }

    /// Number of jobs submitted but not yet finished.
    pub fn pending_jobs(&self) -> usize {
        self.shared.pending.lock().len()
    }

    /// Whether a job for `key` is in flight.
    pub fn is_pending(&self, key: JobKey) -> bool {
        self.shared.pending.lock().contains(&key)
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> PreparerStats {
        let c = &self.shared.counters;
        PreparerStats {
            submitted: c.submitted.load(Ordering::Relaxed),
            deduplicated: c.deduplicated.load(Ordering::Relaxed),
            already_cached: c.already_cached.load(Ordering::Relaxed),
            prepared: c.prepared.load(Ordering::Relaxed),
            failed: c.failed.load(Ordering::Relaxed),
        }
    }
}

impl BitmapFramePreparer for DefaultBitmapFramePreparer {
    fn prepare_frame(
        &self,
        cache: &Arc<dyn BitmapFrameCache>,
        backend: &dyn AnimationBackend,
        frame: u32,
    ) -> bool {
        let key = JobKey {
            backend: backend.backend_id(),
            frame,
        };
        let counters = &self.shared.counters;

        let mut pending = self.shared.pending.lock();
        if pending.contains(&key) {
            tracing::trace!(frame, "already scheduled decode job");
            counters.deduplicated.fetch_add(1, Ordering::Relaxed);
            return true;
        }
        if cache.contains(frame) {
            tracing::trace!(frame, "frame is cached already");
            counters.already_cached.fetch_add(1, Ordering::Relaxed);
            return true;
        }

        let job = FrameJob {
            shared: Arc::clone(&self.shared),
            cache: Arc::clone(cache),
            key,
            width: backend.intrinsic_width(),
            height: backend.intrinsic_height(),
        };
        pending.insert(key);
        drop(pending);

        counters.submitted.fetch_add(1, Ordering::Relaxed);
        // The key is registered before the job exists anywhere else, so even an inline executor
        // unregisters it after this point.
        self.executor.execute(Box::new(move || job.run()));
        true
    }
}

impl FrameJob {
    fn run(self) {
        let _guard = PendingGuard {
            pending: &self.shared.pending,
            key: self.key,
        };
        let frame = self.key.frame;
        let counters = &self.shared.counters;

        if self.cache.contains(frame) {
            tracing::trace!(frame, "frame is cached already");
            counters.already_cached.fetch_add(1, Ordering::Relaxed);
            return;
        }

        if self.prepare_and_cache() {
            tracing::trace!(frame, "prepared frame");
            counters.prepared.fetch_add(1, Ordering::Relaxed);
        } else {
            tracing::warn!(frame, "could not prepare frame");
            counters.failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn prepare_and_cache(&self) -> bool {
        let frame = self.key.frame;

        let reused = self
            .cache
            .get_bitmap_to_reuse_for_frame(frame, self.width, self.height)
            .filter(|h| self.fits(h));
        if self.render_and_cache(reused, FrameType::Reused) {
            return true;
        }

        let created =
            match self
                .shared
                .allocator
                .create_bitmap(self.width, self.height, self.shared.format)
            {
                Ok(h) => h,
                Err(e) => {
                    tracing::warn!(frame, error = %e, "failed to create frame bitmap");
                    return false;
                }
            };
        self.render_and_cache(Some(created), FrameType::Created)
    }

    fn fits(&self, handle: &FrameHandle) -> bool {
        handle.desc().is_some_and(|d| {
            d.width == self.width && d.height == self.height && d.format == self.shared.format
        })
    }

    fn render_and_cache(&self, handle: Option<FrameHandle>, frame_type: FrameType) -> bool {
        let Some(handle) = handle else {
            return false;
        };
        let frame = self.key.frame;
        if let Err(e) = self.shared.renderer.render_into(frame, &handle) {
            tracing::warn!(frame, ?frame_type, error = %e, "failed to render frame");
            return false;
        }
        tracing::trace!(frame, ?frame_type, "frame ready");
        self.cache.on_frame_prepared(frame, &handle, frame_type);
        true
    }
}

#[cfg(test)]
#[path = "../../tests/unit/prepare/preparer.rs"]
mod tests;
