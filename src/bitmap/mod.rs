//! Frame bitmaps, their reference-counted handles, and where they come from.

/// Bitmap allocation.
pub mod allocator;
/// Pixel buffers and shared handles.
pub mod handle;

pub use allocator::{AllocStats, BitmapAllocator, HeapAllocatorOpts, HeapBitmapAllocator};
pub use handle::{Bitmap, BitmapId, FrameHandle, Releaser};
