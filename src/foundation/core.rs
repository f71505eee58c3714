use crate::foundation::error::{AnimError, AnimResult};

/// Pixel layout of a bitmap buffer.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    /// 32-bit RGBA, 8 bits per channel.
    #[default]
    Rgba8888,
    /// 16-bit RGB 5-6-5, no alpha.
    Rgb565,
    /// 8-bit alpha-only mask.
    Alpha8,
}

impl PixelFormat {
    /// Bytes used to store one pixel.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgba8888 => 4,
            PixelFormat::Rgb565 => 2,
            PixelFormat::Alpha8 => 1,
        }
    }
}

/// Dimensions and layout of a bitmap buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BitmapDesc {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Pixel layout.
    pub format: PixelFormat,
}

impl BitmapDesc {
    /// Create a validated descriptor with non-zero dimensions.
    pub fn new(width: u32, height: u32, format: PixelFormat) -> AnimResult<Self> {
        if width == 0 || height == 0 {
            return Err(AnimError::validation(format!(
                "bitmap dimensions must be non-zero, got {width}x{height}"
            )));
        }
        Ok(Self {
            width,
            height,
            format,
        })
    }

    /// Byte length of a tightly packed buffer with this descriptor.
    pub fn byte_len(self) -> usize {
        let px = (self.width as usize).saturating_mul(self.height as usize);
        px.saturating_mul(self.format.bytes_per_pixel())
    }

    /// Bytes in one row.
    pub fn row_bytes(self) -> usize {
        (self.width as usize).saturating_mul(self.format.bytes_per_pixel())
    }
}

/// How the bitmap for a frame was obtained.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FrameType {
    /// Exact frame served from the frame cache.
    Cached,
    /// Rendered into a buffer handed back by the cache for reuse.
    Reused,
    /// Rendered into a freshly allocated buffer.
    Created,
    /// Substitute frame (usually the last rendered one).
    Fallback,
    /// Origin not known.
    Unknown,
}

/// Stable identity of an animation backend, used in preparation job keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BackendId(pub u64);

impl BackendId {
    /// Allocate a process-unique id.
    pub fn next() -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Key identifying one animation's frames inside a shared frame store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AnimationKey(pub u64);

impl AnimationKey {
    /// Derive a key from a source identifier such as a URI.
    pub fn from_source(source: &str) -> Self {
        Self(xxhash_rust::xxh3::xxh3_64(source.as_bytes()))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
