use std::sync::Arc;

use crate::backend::AnimationBackend;
use crate::cache::BitmapFrameCache;
use crate::prepare::preparer::BitmapFramePreparer;

/// Default look-ahead window of [`FixedNumberFramePreparationStrategy`].
pub const DEFAULT_FRAMES_TO_PREPARE: usize = 3;

/// Decides which frames to prepare after a frame was drawn.
pub trait FramePreparationStrategy: Send + Sync {
    /// Submit preparation work relative to `last_drawn`.
    ///
    /// `on_all_prepared` is called once, after all submissions were made. It does not wait for the
    /// submitted jobs.
    fn prepare_frames(
        &self,
        preparer: &dyn BitmapFramePreparer,
        cache: &Arc<dyn BitmapFrameCache>,
        backend: &dyn AnimationBackend,
        last_drawn: u32,
        on_all_prepared: Option<&dyn Fn()>,
    );
}

/// Prepares a single frame.
///
/// The frame is `last_drawn % frame_count`, i.e. the frame that was just drawn and not the one
/// after it. Callers that want real look-ahead should use [`FixedNumberFramePreparationStrategy`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SingleNextFramePreparationStrategy;

impl FramePreparationStrategy for SingleNextFramePreparationStrategy {
    fn prepare_frames(
        &self,
        preparer: &dyn BitmapFramePreparer,
        cache: &Arc<dyn BitmapFrameCache>,
        backend: &dyn AnimationBackend,
        last_drawn: u32,
        on_all_prepared: Option<&dyn Fn()>,
    ) {
        let frame_count = backend.frame_count();
        if frame_count > 0 {
            preparer.prepare_frame(cache, backend, last_drawn % frame_count);
        }
        if let Some(done) = on_all_prepared {
            done();
        }
    }
}

/// Prepares the next `frames_to_prepare` frames, nearest first.
///
/// Stops at the first frame the preparer refuses.
#[derive(Debug, Clone, Copy)]
pub struct FixedNumberFramePreparationStrategy {
    frames_to_prepare: usize,
}

impl Default for FixedNumberFramePreparationStrategy {
    fn default() -> Self {
        Self::new(DEFAULT_FRAMES_TO_PREPARE)
    }
}

impl FixedNumberFramePreparationStrategy {
    /// Create a strategy with a window of `frames_to_prepare` frames.
    pub fn new(frames_to_prepare: usize) -> Self {
        Self { frames_to_prepare }
    }

    /// Size of the look-ahead window.
    pub fn frames_to_prepare(&self) -> usize {
        self.frames_to_prepare
    }
}

impl FramePreparationStrategy for FixedNumberFramePreparationStrategy {
    fn prepare_frames(
        &self,
        preparer: &dyn BitmapFramePreparer,
        cache: &Arc<dyn BitmapFrameCache>,
        backend: &dyn AnimationBackend,
        last_drawn: u32,
        on_all_prepared: Option<&dyn Fn()>,
    ) {
        let frame_count = u64::from(backend.frame_count());
        if frame_count > 0 {
            for offset in 1..=self.frames_to_prepare as u64 {
                let next = (u64::from(last_drawn) + offset) % frame_count;
                // `next < frame_count <= u32::MAX`
                let next = next as u32;
                tracing::trace!(last_drawn, next, "preparing frame");
                if !preparer.prepare_frame(cache, backend, next) {
                    break;
                }
            }
        }
        if let Some(done) = on_all_prepared {
            done();
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/prepare/strategy.rs"]
mod tests;
