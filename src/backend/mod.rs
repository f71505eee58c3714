//! Animation backends and the capabilities they are built from.

use crate::bitmap::handle::{Bitmap, FrameHandle};
use crate::foundation::core::BackendId;
use crate::foundation::error::{AnimError, AnimResult};

pub use bitmap_backend::{BitmapAnimationBackend, FrameListener};
pub use inactivity::{InactivityCheckBackend, InactivityListener, InactivityOpts};
pub use scheduler::{DelayedScheduler, ManualScheduler, ScheduledTask, ThreadScheduler};

/// Bitmap animation backend: the draw path over a frame cache.
pub mod bitmap_backend;
/// Inactivity watchdog delegate.
pub mod inactivity;
/// Delayed task schedulers used by the watchdog.
pub mod scheduler;

/// Frame-level description of an animation, as seen by caches and preparers.
pub trait AnimationBackend: Send + Sync {
    /// Identity used to key preparation jobs.
    fn backend_id(&self) -> BackendId;

    /// Number of frames in one loop.
    fn frame_count(&self) -> u32;

    /// Width of frame bitmaps in pixels.
    fn intrinsic_width(&self) -> u32;

    /// Height of frame bitmaps in pixels.
    fn intrinsic_height(&self) -> u32;
}

/// Decodes frames into caller-supplied buffers.
pub trait FrameRenderer: Send + Sync {
    /// Render `frame` into `bitmap`. Returns `false` when the frame could not be rendered.
    fn render_frame(&self, frame: u32, bitmap: &mut Bitmap) -> bool;

    /// Natural frame width, if the renderer has one.
    fn intrinsic_width(&self) -> Option<u32>;

    /// Natural frame height, if the renderer has one.
    fn intrinsic_height(&self) -> Option<u32>;

    /// Render `frame` into the bitmap behind `handle`.
    fn render_into(&self, frame: u32, handle: &FrameHandle) -> AnimResult<()> {
        let Some(mut bitmap) = handle.lock() else {
            return Err(AnimError::render(format!(
                "frame {frame}: target bitmap was released"
            )));
        };
        if self.render_frame(frame, &mut bitmap) {
            Ok(())
        } else {
            Err(AnimError::render(format!("frame {frame}: renderer failed")))
        }
    }
}

/// Static animation parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimationInformation {
    /// Number of frames in one loop.
    pub frame_count: u32,
    /// Per-frame display durations in milliseconds. Missing entries use the last known duration.
    pub frame_durations_ms: Vec<u32>,
    /// Loops to play; `None` loops forever.
    pub loop_count: Option<u32>,
    /// Width of the animation in pixels.
    pub width: u32,
    /// Height of the animation in pixels.
    pub height: u32,
}

impl AnimationInformation {
    /// Display duration of `frame` in milliseconds.
    pub fn frame_duration_ms(&self, frame: u32) -> u32 {
        self.frame_durations_ms
            .get(frame as usize)
            .or_else(|| self.frame_durations_ms.last())
            .copied()
            .unwrap_or(0)
    }

    /// Duration of one loop in milliseconds.
    pub fn loop_duration_ms(&self) -> u64 {
        (0..self.frame_count)
            .map(|f| u64::from(self.frame_duration_ms(f)))
            .sum()
    }
}

/// Backend that can put frames on a canvas and owns the memory behind them.
pub trait DrawableBackend: AnimationBackend {
    /// Static animation parameters.
    fn animation_info(&self) -> &AnimationInformation;

    /// Draw `frame` on `canvas`. Returns `false` when nothing could be drawn.
    fn draw_frame(&self, canvas: &mut dyn FrameCanvas, frame: u32) -> bool;

    /// Bytes of frame memory currently held for this animation.
    fn size_in_bytes(&self) -> usize;

    /// Drop all held frames.
    fn clear(&self);

    /// Start preparing the first frames. `on_loaded` is called once the work is submitted.
    fn preload_animation(&self, on_loaded: Option<&dyn Fn()>);
}

/// Surface that drawn frames end up on.
pub trait FrameCanvas {
    /// Draw `bitmap` as the current frame.
    fn draw_bitmap(&mut self, frame: u32, bitmap: &Bitmap);
}

/// Canvas that keeps a copy of the last drawn frame.
#[derive(Debug, Default)]
pub struct SnapshotCanvas {
    last: Option<(u32, Bitmap)>,
    draws: u64,
}

impl SnapshotCanvas {
    /// Create an empty canvas.
    pub fn new() -> Self {
        Self::default()
    }

    /// Frame number and pixels of the last draw.
    pub fn last(&self) -> Option<(u32, &Bitmap)> {
        self.last.as_ref().map(|(f, b)| (*f, b))
    }

    /// Number of draws so far.
    pub fn draws(&self) -> u64 {
        self.draws
    }
}

impl FrameCanvas for SnapshotCanvas {
    fn draw_bitmap(&mut self, frame: u32, bitmap: &Bitmap) {
        self.draws += 1;
        match &mut self.last {
            Some((f, b)) if b.desc() == bitmap.desc() => {
                *f = frame;
                b.pixels_mut().copy_from_slice(bitmap.pixels());
            }
            _ => self.last = Some((frame, bitmap.clone())),
        }
    }
}
