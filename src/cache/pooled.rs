use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::bitmap::handle::FrameHandle;
use crate::cache::store::AnimatedFrameStore;
use crate::cache::{BitmapFrameCache, CacheEntry, FrameCacheListener};
use crate::foundation::core::{AnimationKey, FrameType};

#[derive(Default)]
struct State {
    /// Prepared frames not yet drawn, kept alive so store eviction cannot drop them unseen.
    pending: BTreeMap<u32, FrameHandle>,
    last_rendered: Option<FrameHandle>,
}

/// Frame cache that keeps frames in a shared [`AnimatedFrameStore`].
///
/// Storage and eviction belong to the store. This cache only holds the last rendered frame and
/// prepared-but-not-yet-drawn frames. [`BitmapFrameCache::size_in_bytes`] counts just those, not
/// the store; add [`AnimatedFrameStore::size_in_bytes`] for the full picture.
pub struct PooledFrameCache {
    store: Arc<AnimatedFrameStore>,
    animation: AnimationKey,
    enable_reuse: bool,
    state: Mutex<State>,
}

impl PooledFrameCache {
    /// Create a cache for `animation` on top of `store`.
    ///
    /// With `enable_reuse` false, [`BitmapFrameCache::get_bitmap_to_reuse_for_frame`] always
    /// returns `None`.
    pub fn new(
        store: Arc<AnimatedFrameStore>,
        animation: AnimationKey,
        enable_reuse: bool,
    ) -> Self {
        Self {
            store,
            animation,
            enable_reuse,
            state: Mutex::new(State::default()),
        }
    }

    /// Key of the animation in the shared store.
    pub fn animation_key(&self) -> AnimationKey {
        self.animation
    }

    /// Frame numbers currently held as prepared-but-not-drawn.
    pub fn pending_frames(&self) -> Vec<u32> {
        self.state.lock().pending.keys().copied().collect()
    }

    fn store_frame(
        &self,
        frame: u32,
        handle: &FrameHandle,
        frame_type: FrameType,
    ) -> Option<FrameHandle> {
        let entry = CacheEntry::from_handle(handle, frame_type)?;
        self.store.cache(self.animation, frame, entry)
    }
}

impl BitmapFrameCache for PooledFrameCache {
    fn get_cached_frame(&self, frame: u32) -> Option<FrameHandle> {
        let _st = self.state.lock();
        self.store.get(self.animation, frame)
    }

    fn get_fallback_frame(&self, _frame: u32) -> Option<FrameHandle> {
        let st = self.state.lock();
        st.last_rendered.as_ref().and_then(FrameHandle::clone_ref)
    }

    fn get_bitmap_to_reuse_for_frame(
        &self,
        _frame: u32,
        _width: u32,
        _height: u32,
    ) -> Option<FrameHandle> {
        if !self.enable_reuse {
            return None;
        }
        let _st = self.state.lock();
        self.store.get_for_reuse(self.animation)
    }

    fn contains(&self, frame: u32) -> bool {
        let _st = self.state.lock();
        self.store.contains(self.animation, frame)
    }

    fn size_in_bytes(&self) -> usize {
        let st = self.state.lock();
        let last = st
            .last_rendered
            .as_ref()
            .map(FrameHandle::size_in_bytes)
            .unwrap_or(0);
        let pending: usize = st.pending.values().map(FrameHandle::size_in_bytes).sum();
        last + pending
    }

    fn clear(&self) {
        let (last, pending) = {
            let mut st = self.state.lock();
            (st.last_rendered.take(), std::mem::take(&mut st.pending))
        };
        tracing::debug!(
            pending = pending.len(),
            had_last = last.is_some(),
            "pooled frame cache cleared"
        );
    }

    fn on_frame_rendered(&self, frame: u32, handle: &FrameHandle, frame_type: FrameType) {
        let mut st = self.state.lock();
        if st.pending.remove(&frame).is_some() {
            tracing::trace!(frame, pending = st.pending.len(), "removed prepared frame");
        }
        if let Some(last) = &st.last_rendered {
            if last.same_resource(handle) {
                return;
            }
        }
        if let Some(stored) = self.store_frame(frame, handle, frame_type) {
            st.last_rendered = Some(stored);
        }
    }

    fn on_frame_prepared(&self, frame: u32, handle: &FrameHandle, frame_type: FrameType) {
        let mut st = self.state.lock();
        let Some(stored) = self.store_frame(frame, handle, frame_type) else {
            return;
        };
        st.pending.insert(frame, stored);
        tracing::trace!(frame, pending = st.pending.len(), "cached prepared frame");
    }

    fn set_frame_listener(&self, _listener: Option<Arc<dyn FrameCacheListener>>) {
        // Store eviction is not observable per animation.
    }
}

#[cfg(test)]
#[path = "../../tests/unit/cache/pooled.rs"]
mod tests;
