use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::bitmap::handle::{Bitmap, FrameHandle, Releaser};
use crate::foundation::core::{BitmapDesc, PixelFormat};
use crate::foundation::error::{AnimError, AnimResult};

/// Creates fresh bitmap buffers.
///
/// Implementations may fail, e.g. when a memory budget is exhausted.
pub trait BitmapAllocator: Send + Sync {
    /// Allocate a zeroed `width` x `height` buffer in `format`.
    fn create_bitmap(
        &self,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> AnimResult<FrameHandle>;
}

/// Allocator configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeapAllocatorOpts {
    /// Upper bound on bytes held by live bitmaps. `None` means unbounded.
    pub max_live_bytes: Option<u64>,
}

/// Allocation counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AllocStats {
    /// Bitmaps currently alive.
    pub live_bitmaps: u64,
    /// Bytes held by live bitmaps.
    pub live_bytes: u64,
    /// Bitmaps created since construction.
    pub total_allocs: u64,
    /// Bitmaps freed since construction.
    pub total_releases: u64,
    /// Allocation requests refused because of the byte budget.
    pub failed_allocs: u64,
}

#[derive(Debug, Default)]
struct Counters {
    live_bitmaps: AtomicU64,
    live_bytes: AtomicU64,
    total_allocs: AtomicU64,
    total_releases: AtomicU64,
    failed_allocs: AtomicU64,
}

/// Heap-backed allocator that tracks every buffer it hands out.
///
/// Each bitmap reports back when its last reference is released, so [`AllocStats`] reflects the
/// buffers that are actually still alive anywhere in the process.
#[derive(Debug, Clone, Default)]
pub struct HeapBitmapAllocator {
    opts: HeapAllocatorOpts,
    counters: Arc<Counters>,
}

impl HeapBitmapAllocator {
    /// Create an allocator with the given budget.
    pub fn new(opts: HeapAllocatorOpts) -> Self {
        Self {
            opts,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Snapshot of the allocation counters.
    pub fn stats(&self) -> AllocStats {
        let c = &self.counters;
        AllocStats {
            live_bitmaps: c.live_bitmaps.load(Ordering::SeqCst),
            live_bytes: c.live_bytes.load(Ordering::SeqCst),
            total_allocs: c.total_allocs.load(Ordering::SeqCst),
            total_releases: c.total_releases.load(Ordering::SeqCst),
            failed_allocs: c.failed_allocs.load(Ordering::SeqCst),
        }
    }

    fn reserve(&self, bytes: u64) -> AnimResult<()> {
        let Some(max) = self.opts.max_live_bytes else {
            self.counters.live_bytes.fetch_add(bytes, Ordering::SeqCst);
            return Ok(());
        };
        self.counters
            .live_bytes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |live| {
                let next = live.saturating_add(bytes);
                (next <= max).then_some(next)
            })
            .map(|_| ())
            .map_err(|live| {
                self.counters.failed_allocs.fetch_add(1, Ordering::SeqCst);
                AnimError::allocation(format!(
                    "bitmap of {bytes} bytes exceeds budget ({live} of {max} bytes live)"
                ))
            })
    }
}

impl BitmapAllocator for HeapBitmapAllocator {
    fn create_bitmap(
        &self,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> AnimResult<FrameHandle> {
        let desc = BitmapDesc::new(width, height, format)?;
        let bytes = desc.byte_len() as u64;
        self.reserve(bytes)?;

        self.counters.live_bitmaps.fetch_add(1, Ordering::SeqCst);
        self.counters.total_allocs.fetch_add(1, Ordering::SeqCst);

        let counters = Arc::clone(&self.counters);
        let releaser: Releaser = Arc::new(move |_id, bytes| {
            counters.live_bitmaps.fetch_sub(1, Ordering::SeqCst);
            counters.live_bytes.fetch_sub(bytes as u64, Ordering::SeqCst);
            counters.total_releases.fetch_add(1, Ordering::SeqCst);
        });
        Ok(FrameHandle::with_releaser(Bitmap::new(desc), Some(releaser)))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/bitmap/allocator.rs"]
mod tests;
