use std::sync::Arc;

use parking_lot::Mutex;

use crate::backend::inactivity::InactivityListener;
use crate::backend::{
    AnimationBackend, AnimationInformation, DrawableBackend, FrameCanvas, FrameRenderer,
};
use crate::bitmap::allocator::BitmapAllocator;
use crate::bitmap::handle::FrameHandle;
use crate::cache::BitmapFrameCache;
use crate::foundation::core::{BackendId, FrameType, PixelFormat};
use crate::prepare::preparer::BitmapFramePreparer;
use crate::prepare::strategy::FramePreparationStrategy;

/// Observer of the draw path.
pub trait FrameListener: Send + Sync {
    /// Drawing of `frame` started.
    fn on_draw_frame_start(&self, frame: u32);
    /// `frame` was drawn from a bitmap of kind `frame_type`.
    fn on_frame_drawn(&self, frame: u32, frame_type: FrameType);
    /// Nothing could be drawn for `frame`.
    fn on_frame_dropped(&self, frame: u32);
}

struct Preparation {
    strategy: Arc<dyn FramePreparationStrategy>,
    preparer: Arc<dyn BitmapFramePreparer>,
}

/// Draws animation frames from a [`BitmapFrameCache`], rendering on demand.
///
/// A draw tries, in order: the cached frame, a reusable cache buffer rendered in place, a fresh
/// buffer rendered in place, and the cache's fallback frame. Every non-fallback bitmap that gets
/// drawn is reported back to the cache. After each draw the preparation strategy (if any) is
/// asked to prepare upcoming frames.
pub struct BitmapAnimationBackend {
    id: BackendId,
    allocator: Arc<dyn BitmapAllocator>,
    cache: Arc<dyn BitmapFrameCache>,
    info: AnimationInformation,
    renderer: Arc<dyn FrameRenderer>,
    format: PixelFormat,
    width: u32,
    height: u32,
    preparation: Option<Preparation>,
    frame_listener: Mutex<Option<Arc<dyn FrameListener>>>,
}

impl BitmapAnimationBackend {
    /// Create a backend without frame preparation.
    ///
    /// Bitmap dimensions come from the renderer, or from `info` where the renderer has none.
    pub fn new(
        allocator: Arc<dyn BitmapAllocator>,
        cache: Arc<dyn BitmapFrameCache>,
        info: AnimationInformation,
        renderer: Arc<dyn FrameRenderer>,
    ) -> Self {
        let width = renderer.intrinsic_width().unwrap_or(info.width);
        let height = renderer.intrinsic_height().unwrap_or(info.height);
        Self {
            id: BackendId::next(),
            allocator,
            cache,
            info,
            renderer,
            format: PixelFormat::default(),
            width,
            height,
            preparation: None,
            frame_listener: Mutex::new(None),
        }
    }

    /// Prepare upcoming frames with `strategy` and `preparer` after every draw.
    pub fn with_preparation(
        mut self,
        strategy: Arc<dyn FramePreparationStrategy>,
        preparer: Arc<dyn BitmapFramePreparer>,
    ) -> Self {
        self.preparation = Some(Preparation { strategy, preparer });
        self
    }

    /// Pixel format of bitmaps allocated on the draw path.
    pub fn with_format(mut self, format: PixelFormat) -> Self {
        self.format = format;
        self
    }

    /// The frame cache.
    pub fn cache(&self) -> &Arc<dyn BitmapFrameCache> {
        &self.cache
    }

    /// Replace the frame listener.
    pub fn set_frame_listener(&self, listener: Option<Arc<dyn FrameListener>>) {
        *self.frame_listener.lock() = listener;
    }

    fn draw_frame_or_fallback(
        &self,
        canvas: &mut dyn FrameCanvas,
        frame: u32,
        listener: Option<&dyn FrameListener>,
    ) -> Option<FrameType> {
        let cached = self.cache.get_cached_frame(frame);
        if self.draw_bitmap_and_cache(canvas, frame, cached, FrameType::Cached, listener) {
            return Some(FrameType::Cached);
        }

        let reused = self
            .cache
            .get_bitmap_to_reuse_for_frame(frame, self.width, self.height)
            .filter(|h| self.fits(h))
            .filter(|h| self.render_in_place(frame, h));
        if self.draw_bitmap_and_cache(canvas, frame, reused, FrameType::Reused, listener) {
            return Some(FrameType::Reused);
        }

        match self
            .allocator
            .create_bitmap(self.width, self.height, self.format)
        {
            Ok(created) => {
                let created = Some(created).filter(|h| self.render_in_place(frame, h));
                if self.draw_bitmap_and_cache(canvas, frame, created, FrameType::Created, listener)
                {
                    return Some(FrameType::Created);
                }
            }
            Err(e) => tracing::warn!(frame, error = %e, "failed to create frame bitmap"),
        }

        let fallback = self.cache.get_fallback_frame(frame);
        if self.draw_bitmap_and_cache(canvas, frame, fallback, FrameType::Fallback, listener) {
            return Some(FrameType::Fallback);
        }
        None
    }

    fn fits(&self, handle: &FrameHandle) -> bool {
        handle.desc().is_some_and(|d| {
            d.width == self.width && d.height == self.height && d.format == self.format
        })
    }

    fn render_in_place(&self, frame: u32, handle: &FrameHandle) -> bool {
        match self.renderer.render_into(frame, handle) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(frame, error = %e, "could not render frame in place");
                false
            }
        }
    }

    fn draw_bitmap_and_cache(
        &self,
        canvas: &mut dyn FrameCanvas,
        frame: u32,
        handle: Option<FrameHandle>,
        frame_type: FrameType,
        listener: Option<&dyn FrameListener>,
    ) -> bool {
        let Some(handle) = handle else {
            return false;
        };
        match handle.lock() {
            Some(bitmap) => canvas.draw_bitmap(frame, &bitmap),
            None => return false,
        }
        // Fallback bitmaps belong to another frame and must not be cached under this one.
        if frame_type != FrameType::Fallback {
            self.cache.on_frame_rendered(frame, &handle, frame_type);
        }
        if let Some(l) = listener {
            l.on_frame_drawn(frame, frame_type);
        }
        true
    }
}

impl AnimationBackend for BitmapAnimationBackend {
    fn backend_id(&self) -> BackendId {
        self.id
    }

    fn frame_count(&self) -> u32 {
        self.info.frame_count
    }

    fn intrinsic_width(&self) -> u32 {
        self.width
    }

    fn intrinsic_height(&self) -> u32 {
        self.height
    }
}

impl DrawableBackend for BitmapAnimationBackend {
    fn animation_info(&self) -> &AnimationInformation {
        &self.info
    }

    fn draw_frame(&self, canvas: &mut dyn FrameCanvas, frame: u32) -> bool {
        let listener = self.frame_listener.lock().clone();
        if let Some(l) = &listener {
            l.on_draw_frame_start(frame);
        }

        let drawn = self.draw_frame_or_fallback(canvas, frame, listener.as_deref());
        if drawn.is_none() {
            tracing::debug!(frame, "frame dropped");
            if let Some(l) = &listener {
                l.on_frame_dropped(frame);
            }
        }

        if let Some(p) = &self.preparation {
            p.strategy
                .prepare_frames(p.preparer.as_ref(), &self.cache, self, frame, None);
        }
        drawn.is_some()
    }

    fn size_in_bytes(&self) -> usize {
        self.cache.size_in_bytes()
    }

    fn clear(&self) {
        self.cache.clear();
    }

    fn preload_animation(&self, on_loaded: Option<&dyn Fn()>) {
        match &self.preparation {
            Some(p) => {
                p.strategy
                    .prepare_frames(p.preparer.as_ref(), &self.cache, self, 0, on_loaded)
            }
            None => {
                if let Some(done) = on_loaded {
                    done();
                }
            }
        }
    }
}

impl InactivityListener for BitmapAnimationBackend {
    fn on_inactive(&self) {
        tracing::debug!(backend = self.id.0, "animation inactive, releasing frames");
        self.clear();
    }
}

#[cfg(test)]
#[path = "../../tests/unit/backend/bitmap_backend.rs"]
mod tests;
