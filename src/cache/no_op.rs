use std::sync::Arc;

use crate::bitmap::handle::FrameHandle;
use crate::cache::{BitmapFrameCache, FrameCacheListener};
use crate::foundation::core::FrameType;

/// Frame cache that never stores anything. Used when caching is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpCache;

impl NoOpCache {
    /// Create the cache.
    pub fn new() -> Self {
        Self
    }
}

impl BitmapFrameCache for NoOpCache {
    fn get_cached_frame(&self, _frame: u32) -> Option<FrameHandle> {
        None
    }

    fn get_fallback_frame(&self, _frame: u32) -> Option<FrameHandle> {
        None
    }

    fn get_bitmap_to_reuse_for_frame(
        &self,
        _frame: u32,
        _width: u32,
        _height: u32,
    ) -> Option<FrameHandle> {
        None
    }

    fn contains(&self, _frame: u32) -> bool {
        false
    }

    fn size_in_bytes(&self) -> usize {
        0
    }

    fn clear(&self) {}

    fn on_frame_rendered(&self, _frame: u32, _handle: &FrameHandle, _frame_type: FrameType) {}

    fn on_frame_prepared(&self, _frame: u32, _handle: &FrameHandle, _frame_type: FrameType) {}

    fn set_frame_listener(&self, _listener: Option<Arc<dyn FrameCacheListener>>) {}
}

#[cfg(test)]
#[path = "../../tests/unit/cache/no_op.rs"]
mod tests;
