use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::backend::scheduler::DelayedScheduler;
use crate::backend::{AnimationBackend, AnimationInformation, DrawableBackend, FrameCanvas};
use crate::foundation::clock::MonotonicClock;
use crate::foundation::core::BackendId;
use crate::foundation::error::{AnimError, AnimResult};

/// Callback for animations that stopped being drawn.
pub trait InactivityListener: Send + Sync {
    /// No frame was drawn for longer than the inactivity threshold.
    fn on_inactive(&self);
}

/// Watchdog timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InactivityOpts {
    /// Idle time after the last draw before the listener fires.
    pub threshold_ms: u64,
    /// Interval between checks.
    pub polling_ms: u64,
}

impl Default for InactivityOpts {
    fn default() -> Self {
        Self {
            threshold_ms: 2000,
            polling_ms: 1000,
        }
    }
}

impl InactivityOpts {
    /// Reject a zero polling interval.
    pub fn validate(&self) -> AnimResult<()> {
        if self.polling_ms == 0 {
            return Err(AnimError::validation(
                "inactivity polling interval must be > 0",
            ));
        }
        Ok(())
    }
}

struct WatchState {
    last_drawn_ms: u64,
    check_scheduled: bool,
    listener: Option<Arc<dyn InactivityListener>>,
}

struct Watchdog {
    opts: InactivityOpts,
    clock: Arc<dyn MonotonicClock>,
    scheduler: Arc<dyn DelayedScheduler>,
    state: Mutex<WatchState>,
}

impl Watchdog {
    fn on_drawn(self: &Arc<Self>) {
        let mut st = self.state.lock();
        st.last_drawn_ms = self.clock.now_ms();
        if st.check_scheduled {
            return;
        }
        st.check_scheduled = true;
        drop(st);
        self.schedule_check();
    }

    fn schedule_check(self: &Arc<Self>) {
        let watchdog = Arc::downgrade(self);
        self.scheduler.schedule(
            self.opts.polling_ms,
            Box::new(move || Watchdog::run_check(&watchdog)),
        );
    }

    fn run_check(watchdog: &Weak<Self>) {
        // The backend is gone; nothing to watch.
        let Some(this) = watchdog.upgrade() else {
            return;
        };
        let mut st = this.state.lock();
        let elapsed = this.clock.now_ms().saturating_sub(st.last_drawn_ms);
        if elapsed > this.opts.threshold_ms {
            st.check_scheduled = false;
            let listener = st.listener.clone();
            drop(st);
            tracing::debug!(elapsed_ms = elapsed, "animation inactive");
            if let Some(l) = listener {
                l.on_inactive();
            }
        } else {
            // Still active: keep exactly one check in flight.
            drop(st);
            this.schedule_check();
        }
    }
}

/// Delegate that reports when the wrapped backend has not drawn for a while.
///
/// Every successful draw records the current time and, unless a check is already pending,
/// schedules one after the polling interval. A check that finds the animation idle for longer
/// than the threshold calls the [`InactivityListener`] and schedules nothing further until the
/// next successful draw; otherwise it schedules the next check.
pub struct InactivityCheckBackend<B: ?Sized> {
    inner: Arc<B>,
    watchdog: Arc<Watchdog>,
}

impl<B: DrawableBackend + ?Sized> InactivityCheckBackend<B> {
    /// Wrap `inner`.
    pub fn new(
        inner: Arc<B>,
        clock: Arc<dyn MonotonicClock>,
        scheduler: Arc<dyn DelayedScheduler>,
        opts: InactivityOpts,
    ) -> AnimResult<Self> {
        opts.validate()?;
        let last_drawn_ms = clock.now_ms();
        Ok(Self {
            inner,
            watchdog: Arc::new(Watchdog {
                opts,
                clock,
                scheduler,
                state: Mutex::new(WatchState {
                    last_drawn_ms,
                    check_scheduled: false,
                    listener: None,
                }),
            }),
        })
    }

    /// The wrapped backend.
    pub fn inner(&self) -> &Arc<B> {
        &self.inner
    }

    /// Watchdog timing.
    pub fn opts(&self) -> InactivityOpts {
        self.watchdog.opts
    }

    /// Replace the inactivity listener.
    pub fn set_inactivity_listener(&self, listener: Option<Arc<dyn InactivityListener>>) {
        self.watchdog.state.lock().listener = listener;
    }

    /// Whether a check is pending.
    pub fn is_check_scheduled(&self) -> bool {
        self.watchdog.state.lock().check_scheduled
    }

    /// Clock reading at the last successful draw, or at construction.
    pub fn last_drawn_ms(&self) -> u64 {
        self.watchdog.state.lock().last_drawn_ms
    }
}

impl<B: DrawableBackend + ?Sized> AnimationBackend for InactivityCheckBackend<B> {
    fn backend_id(&self) -> BackendId {
        self.inner.backend_id()
    }

    fn frame_count(&self) -> u32 {
        self.inner.frame_count()
    }

    fn intrinsic_width(&self) -> u32 {
        self.inner.intrinsic_width()
    }

    fn intrinsic_height(&self) -> u32 {
        self.inner.intrinsic_height()
    }
}

impl<B: DrawableBackend + ?Sized> DrawableBackend for InactivityCheckBackend<B> {
    fn animation_info(&self) -> &AnimationInformation {
        self.inner.animation_info()
    }

    fn draw_frame(&self, canvas: &mut dyn FrameCanvas, frame: u32) -> bool {
        let drawn = self.inner.draw_frame(canvas, frame);
        if drawn {
            self.watchdog.on_drawn();
        }
        drawn
    }

    fn size_in_bytes(&self) -> usize {
        self.inner.size_in_bytes()
    }

    fn clear(&self) {
        self.inner.clear();
    }

    fn preload_animation(&self, on_loaded: Option<&dyn Fn()>) {
        self.inner.preload_animation(on_loaded);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/backend/inactivity.rs"]
mod tests;
