//! Frame caches.
//!
//! A [`BitmapFrameCache`] decides which decoded frames of one animation stay in memory. Three
//! strategies are provided: [`NoOpCache`], [`KeepLastFrameCache`] and [`PooledFrameCache`] (backed
//! by a shared [`AnimatedFrameStore`]).

use std::sync::Arc;
use std::time::Instant;

use crate::bitmap::handle::FrameHandle;
use crate::foundation::core::FrameType;

/// Cache that keeps nothing.
pub mod no_op;
/// Cache that keeps the most recently rendered frame.
pub mod keep_last;
/// Cache backed by a shared, size-bounded frame store.
pub mod pooled;
/// Shared LRU frame store.
pub mod store;

pub use keep_last::KeepLastFrameCache;
pub use no_op::NoOpCache;
pub use pooled::PooledFrameCache;
pub use store::{AnimatedFrameStore, FrameStoreOpts, FrameStoreStats};

/// Observer of cache and evict events.
pub trait FrameCacheListener: Send + Sync {
    /// `frame` was stored.
    fn on_frame_cached(&self, frame: u32);
    /// `frame` was dropped from the cache.
    fn on_frame_evicted(&self, frame: u32);
}

/// Cache of decoded frames for a single animation.
///
/// All operations are internally synchronized and may be called from the render thread and from
/// preparation workers at the same time. Every `FrameHandle` returned is a new reference owned by
/// the caller.
pub trait BitmapFrameCache: Send + Sync {
    /// Exact match for `frame`, if cached.
    fn get_cached_frame(&self, frame: u32) -> Option<FrameHandle>;

    /// Best substitute when `frame` is not cached. `frame` is ignored by the built-in caches.
    fn get_fallback_frame(&self, frame: u32) -> Option<FrameHandle>;

    /// Hand over a buffer that a new frame may be written into.
    ///
    /// A returned buffer is no longer considered cached.
    fn get_bitmap_to_reuse_for_frame(
        &self,
        frame: u32,
        width: u32,
        height: u32,
    ) -> Option<FrameHandle>;

    /// Whether [`BitmapFrameCache::get_cached_frame`] would currently return a frame.
    fn contains(&self, frame: u32) -> bool;

    /// Bytes of the frames this cache is responsible for releasing.
    fn size_in_bytes(&self) -> usize;

    /// Release every owned frame. Idempotent.
    fn clear(&self);

    /// `handle` was just drawn as `frame`. The cache takes its own reference.
    fn on_frame_rendered(&self, frame: u32, handle: &FrameHandle, frame_type: FrameType);

    /// `handle` was rendered ahead of playback for `frame`. The cache takes its own reference.
    fn on_frame_prepared(&self, frame: u32, handle: &FrameHandle, frame_type: FrameType);

    /// Replace the cache event listener.
    fn set_frame_listener(&self, listener: Option<Arc<dyn FrameCacheListener>>);
}

/// A cached frame plus bookkeeping.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Reference owned by the cache.
    pub handle: FrameHandle,
    /// How the bitmap was produced.
    pub frame_type: FrameType,
    /// Bytes of the underlying buffer.
    pub size_in_bytes: usize,
    /// When the entry was stored. Diagnostics only.
    pub cached_at: Instant,
}

impl CacheEntry {
    /// Take a new reference to `handle`. `None` when `handle` was already released.
    pub fn from_handle(handle: &FrameHandle, frame_type: FrameType) -> Option<Self> {
        let handle = handle.clone_ref()?;
        Some(Self {
            size_in_bytes: handle.size_in_bytes(),
            handle,
            frame_type,
            cached_at: Instant::now(),
        })
    }
}
