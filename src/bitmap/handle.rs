use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, MutexGuard};

use crate::foundation::core::BitmapDesc;

/// Process-unique identity of an underlying bitmap resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BitmapId(pub u64);

impl BitmapId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Decoded pixel buffer for one frame.
#[derive(Clone)]
pub struct Bitmap {
    desc: BitmapDesc,
    pixels: Vec<u8>,
}

impl fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bitmap")
            .field("desc", &self.desc)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

impl Bitmap {
    /// Allocate a zeroed buffer.
    pub fn new(desc: BitmapDesc) -> Self {
        Self {
            desc,
            pixels: vec![0u8; desc.byte_len()],
        }
    }

    /// Buffer descriptor.
    pub fn desc(&self) -> BitmapDesc {
        self.desc
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.desc.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.desc.height
    }

    /// Byte size of the pixel storage.
    pub fn size_in_bytes(&self) -> usize {
        self.pixels.len()
    }

    /// Raw pixel bytes, row-major, tightly packed.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Mutable raw pixel bytes.
    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    /// Set every byte of every pixel to the matching byte of `px`.
    ///
    /// `px` must be exactly one pixel wide for the buffer's format.
    pub fn fill(&mut self, px: &[u8]) {
        if px.len() != self.desc.format.bytes_per_pixel() {
            return;
        }
        for chunk in self.pixels.chunks_exact_mut(px.len()) {
            chunk.copy_from_slice(px);
        }
    }
}

/// Callback invoked once when the last reference to a bitmap goes away.
pub type Releaser = Arc<dyn Fn(BitmapId, usize) + Send + Sync>;

struct SharedBitmap {
    id: BitmapId,
    desc: BitmapDesc,
    bitmap: Mutex<Bitmap>,
    releaser: Option<Releaser>,
}

impl Drop for SharedBitmap {
    fn drop(&mut self) {
        if let Some(release) = self.releaser.take() {
            release(self.id, self.desc.byte_len());
        }
    }
}

/// Reference-counted handle to a frame bitmap.
///
/// Cloning takes a new reference; [`FrameHandle::release`] (or dropping the handle) gives it up.
/// The underlying buffer is freed, and its releaser called, when the last reference is gone.
/// Releasing an already released handle is a no-op.
pub struct FrameHandle {
    inner: Option<Arc<SharedBitmap>>,
}

impl FrameHandle {
    /// Wrap `bitmap` in a new handle with no release callback.
    pub fn new(bitmap: Bitmap) -> Self {
        Self::with_releaser(bitmap, None)
    }

    /// Wrap `bitmap` and call `releaser` when the last reference is released.
    pub fn with_releaser(bitmap: Bitmap, releaser: Option<Releaser>) -> Self {
        let desc = bitmap.desc();
        Self {
            inner: Some(Arc::new(SharedBitmap {
                id: BitmapId::next(),
                desc,
                bitmap: Mutex::new(bitmap),
                releaser,
            })),
        }
    }

    /// A handle that refers to nothing.
    pub fn invalid() -> Self {
        Self { inner: None }
    }

    /// Whether this handle still holds a reference.
    pub fn is_valid(&self) -> bool {
        self.inner.is_some()
    }

    /// Take a new reference, or `None` when this handle was released.
    pub fn clone_ref(&self) -> Option<FrameHandle> {
        self.inner.as_ref().map(|inner| FrameHandle {
            inner: Some(Arc::clone(inner)),
        })
    }

    /// Give up this reference. Idempotent.
    pub fn release(&mut self) {
        self.inner = None;
    }

    /// Identity of the underlying resource.
    pub fn id(&self) -> Option<BitmapId> {
        self.inner.as_ref().map(|i| i.id)
    }

    /// Descriptor of the underlying resource.
    pub fn desc(&self) -> Option<BitmapDesc> {
        self.inner.as_ref().map(|i| i.desc)
    }

    /// Byte size of the underlying buffer, or 0 for a released handle.
    pub fn size_in_bytes(&self) -> usize {
        self.inner.as_ref().map(|i| i.desc.byte_len()).unwrap_or(0)
    }

    /// Number of live references to the underlying resource, or 0 for a released handle.
    pub fn ref_count(&self) -> usize {
        self.inner.as_ref().map(Arc::strong_count).unwrap_or(0)
    }

    /// Whether both handles refer to the same underlying resource.
    pub fn same_resource(&self, other: &FrameHandle) -> bool {
        match (&self.inner, &other.inner) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Lock the pixel buffer for reading or writing.
    pub fn lock(&self) -> Option<MutexGuard<'_, Bitmap>> {
        self.inner.as_ref().map(|i| i.bitmap.lock())
    }
}

impl Clone for FrameHandle {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl fmt::Debug for FrameHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            Some(i) => f
                .debug_struct("FrameHandle")
                .field("id", &i.id)
                .field("desc", &i.desc)
                .field("refs", &Arc::strong_count(i))
                .finish(),
            None => f.write_str("FrameHandle(released)"),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/bitmap/handle.rs"]
mod tests;
