use lru::LruCache;
use parking_lot::Mutex;

use crate::bitmap::handle::FrameHandle;
use crate::cache::CacheEntry;
use crate::foundation::core::AnimationKey;

/// Limits for an [`AnimatedFrameStore`].
#[derive(Debug, Clone, Copy)]
pub struct FrameStoreOpts {
    /// Maximum bytes retained across all animations.
    pub max_bytes: usize,
    /// Maximum number of retained frames across all animations.
    pub max_entries: usize,
}

impl Default for FrameStoreOpts {
    fn default() -> Self {
        Self {
            max_bytes: 64 * 1024 * 1024,
            max_entries: 256,
        }
    }
}

/// Store counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FrameStoreStats {
    /// Frames currently retained.
    pub entries: usize,
    /// Bytes currently retained.
    pub bytes: usize,
    /// Frames dropped to stay within limits.
    pub evictions: u64,
    /// Frames handed out for reuse.
    pub reused: u64,
    /// Insertions refused because a single frame exceeded `max_bytes`.
    pub rejected: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct FrameKey {
    animation: AnimationKey,
    frame: u32,
}

struct Inner {
    lru: LruCache<FrameKey, CacheEntry>,
    stats: FrameStoreStats,
}

/// Size-bounded LRU store of decoded frames, shared by many animations.
///
/// The store owns one reference per retained frame. Eviction only picks frames nobody else
/// references, so a frame handed out by [`AnimatedFrameStore::get`] or
/// [`AnimatedFrameStore::cache`] stays stored while that reference lives.
pub struct AnimatedFrameStore {
    opts: FrameStoreOpts,
    inner: Mutex<Inner>,
}

impl AnimatedFrameStore {
    /// Create an empty store.
    pub fn new(opts: FrameStoreOpts) -> Self {
        Self {
            opts,
            inner: Mutex::new(Inner {
                lru: LruCache::unbounded(),
                stats: FrameStoreStats::default(),
            }),
        }
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> FrameStoreStats {
        self.inner.lock().stats
    }

    /// Bytes currently retained.
    pub fn size_in_bytes(&self) -> usize {
        self.inner.lock().stats.bytes
    }

    /// Frames currently retained.
    pub fn len(&self) -> usize {
        self.inner.lock().lru.len()
    }

    /// Whether the store retains nothing.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// New reference to the stored frame, marking it most recently used.
    pub fn get(&self, animation: AnimationKey, frame: u32) -> Option<FrameHandle> {
        let mut inner = self.inner.lock();
        inner
            .lru
            .get(&FrameKey { animation, frame })
            .and_then(|e| e.handle.clone_ref())
    }

    /// Whether a frame is stored. Does not affect recency.
    pub fn contains(&self, animation: AnimationKey, frame: u32) -> bool {
        self.inner.lock().lru.contains(&FrameKey { animation, frame })
    }

    /// Store `entry`, replacing any previous frame under the same key.
    ///
    /// Returns a new reference to the stored frame, or `None` when the frame can never fit.
    pub fn cache(
        &self,
        animation: AnimationKey,
        frame: u32,
        entry: CacheEntry,
    ) -> Option<FrameHandle> {
        let mut inner = self.inner.lock();
        if entry.size_in_bytes > self.opts.max_bytes || self.opts.max_entries == 0 {
            inner.stats.rejected += 1;
            return None;
        }

        let out = entry.handle.clone_ref()?;
        let bytes = entry.size_in_bytes;
        if let Some(old) = inner.lru.put(FrameKey { animation, frame }, entry) {
            inner.stats.bytes = inner.stats.bytes.saturating_sub(old.size_in_bytes);
        }
        inner.stats.bytes = inner.stats.bytes.saturating_add(bytes);
        self.trim(&mut inner);
        inner.stats.entries = inner.lru.len();
        Some(out)
    }

    /// Take the least recently used frame of `animation` that nobody else references.
    ///
    /// The frame is removed from the store and its buffer handed to the caller for overwriting.
    pub fn get_for_reuse(&self, animation: AnimationKey) -> Option<FrameHandle> {
        let mut inner = self.inner.lock();
        let key = inner
            .lru
            .iter()
            .rev()
            .find(|(k, e)| k.animation == animation && e.handle.ref_count() == 1)
            .map(|(k, _)| *k)?;
        let entry = inner.lru.pop(&key)?;
        inner.stats.bytes = inner.stats.bytes.saturating_sub(entry.size_in_bytes);
        inner.stats.entries = inner.lru.len();
        inner.stats.reused += 1;
        Some(entry.handle)
    }

    /// Drop every frame stored for `animation`.
    pub fn clear_animation(&self, animation: AnimationKey) {
        let mut inner = self.inner.lock();
        let keys: Vec<FrameKey> = inner
            .lru
            .iter()
            .filter(|(k, _)| k.animation == animation)
            .map(|(k, _)| *k)
            .collect();
        for k in keys {
            if let Some(e) = inner.lru.pop(&k) {
                inner.stats.bytes = inner.stats.bytes.saturating_sub(e.size_in_bytes);
            }
        }
        inner.stats.entries = inner.lru.len();
    }

    /// Evict least recently used frames until the limits hold again.
    ///
    /// Only frames the store alone references are evictable. Frames still held elsewhere, such as
    /// a cache's pending or last-rendered entry, stay put and the store may remain over its limits
    /// until they are let go.
    fn trim(&self, inner: &mut Inner) {
        while inner.lru.len() > self.opts.max_entries || inner.stats.bytes > self.opts.max_bytes {
            let Some(key) = inner
                .lru
                .iter()
                .rev()
                .find(|(_, e)| e.handle.ref_count() == 1)
                .map(|(k, _)| *k)
            else {
                tracing::trace!(
                    entries = inner.lru.len(),
                    bytes = inner.stats.bytes,
                    "frame store over limit, every frame in use"
                );
                break;
            };
            let Some(evicted) = inner.lru.pop(&key) else {
                break;
            };
            inner.stats.bytes = inner.stats.bytes.saturating_sub(evicted.size_in_bytes);
            inner.stats.evictions += 1;
            tracing::trace!(frame = key.frame, "frame store evicted frame");
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/cache/store.rs"]
mod tests;
