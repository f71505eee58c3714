use std::sync::Arc;

use parking_lot::Mutex;

use crate::bitmap::handle::FrameHandle;
use crate::cache::{BitmapFrameCache, CacheEntry, FrameCacheListener};
use crate::foundation::core::FrameType;

#[derive(Default)]
struct State {
    last: Option<(u32, CacheEntry)>,
    listener: Option<Arc<dyn FrameCacheListener>>,
}

enum Event {
    Cached(u32),
    Evicted(u32),
}

/// Frame cache that holds only the most recently rendered frame.
///
/// The single slot doubles as the reuse buffer: handing it out for reuse empties the slot, so a
/// buffer is never reused twice without being rendered again in between.
#[derive(Default)]
pub struct KeepLastFrameCache {
    state: Mutex<State>,
}

impl KeepLastFrameCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Frame number currently held, if any.
    pub fn last_frame_number(&self) -> Option<u32> {
        self.state.lock().last.as_ref().map(|(n, _)| *n)
    }

    fn take_last(state: &mut State, events: &mut Vec<Event>) -> Option<CacheEntry> {
        let (frame, entry) = state.last.take()?;
        events.push(Event::Evicted(frame));
        Some(entry)
    }

    // Listener callbacks run after the lock is dropped so a listener may call back into the cache.
    fn notify(listener: Option<Arc<dyn FrameCacheListener>>, events: Vec<Event>) {
        let Some(listener) = listener else {
            return;
        };
        for ev in events {
            match ev {
                Event::Cached(n) => listener.on_frame_cached(n),
                Event::Evicted(n) => listener.on_frame_evicted(n),
            }
        }
    }
}

impl BitmapFrameCache for KeepLastFrameCache {
    fn get_cached_frame(&self, frame: u32) -> Option<FrameHandle> {
        let st = self.state.lock();
        match &st.last {
            Some((n, entry)) if *n == frame => entry.handle.clone_ref(),
            _ => None,
        }
    }

    fn get_fallback_frame(&self, _frame: u32) -> Option<FrameHandle> {
        let st = self.state.lock();
        st.last.as_ref().and_then(|(_, e)| e.handle.clone_ref())
    }

    fn get_bitmap_to_reuse_for_frame(
        &self,
        _frame: u32,
        _width: u32,
        _height: u32,
    ) -> Option<FrameHandle> {
        let mut events = Vec::new();
        let (out, listener) = {
            let mut st = self.state.lock();
            let out = Self::take_last(&mut st, &mut events).map(|e| e.handle);
            (out, st.listener.clone())
        };
        Self::notify(listener, events);
        out
    }

    fn contains(&self, frame: u32) -> bool {
        let st = self.state.lock();
        matches!(&st.last, Some((n, e)) if *n == frame && e.handle.is_valid())
    }

    fn size_in_bytes(&self) -> usize {
        let st = self.state.lock();
        st.last.as_ref().map(|(_, e)| e.size_in_bytes).unwrap_or(0)
    }

    fn clear(&self) {
        let mut events = Vec::new();
        let (dropped, listener) = {
            let mut st = self.state.lock();
            (Self::take_last(&mut st, &mut events), st.listener.clone())
        };
        drop(dropped);
        Self::notify(listener, events);
    }

    fn on_frame_rendered(&self, frame: u32, handle: &FrameHandle, frame_type: FrameType) {
        let mut events = Vec::new();
        let (superseded, listener) = {
            let mut st = self.state.lock();
            if let Some((_, e)) = &st.last {
                if e.handle.same_resource(handle) {
                    return;
                }
            }
            let Some(entry) = CacheEntry::from_handle(handle, frame_type) else {
                return;
            };
            let superseded = Self::take_last(&mut st, &mut events);
            st.last = Some((frame, entry));
            events.push(Event::Cached(frame));
            (superseded, st.listener.clone())
        };
        drop(superseded);
        Self::notify(listener, events);
    }

    fn on_frame_prepared(&self, _frame: u32, _handle: &FrameHandle, _frame_type: FrameType) {}

    fn set_frame_listener(&self, listener: Option<Arc<dyn FrameCacheListener>>) {
        self.state.lock().listener = listener;
    }
}

#[cfg(test)]
#[path = "../../tests/unit/cache/keep_last.rs"]
mod tests;
