use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use super::*;
use crate::backend::SnapshotCanvas;
use crate::backend::scheduler::ManualScheduler;
use crate::foundation::clock::ManualClock;

struct FakeDrawable {
    id: BackendId,
    info: AnimationInformation,
    draw_ok: AtomicBool,
    cleared: AtomicUsize,
    preloaded: AtomicUsize,
}

impl FakeDrawable {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            id: BackendId::next(),
            info: AnimationInformation {
                frame_count: 4,
                frame_durations_ms: vec![100],
                loop_count: None,
                width: 2,
                height: 3,
            },
            draw_ok: AtomicBool::new(true),
            cleared: AtomicUsize::new(0),
            preloaded: AtomicUsize::new(0),
        })
    }
}

impl AnimationBackend for FakeDrawable {
    fn backend_id(&self) -> BackendId {
        self.id
    }

    fn frame_count(&self) -> u32 {
        self.info.frame_count
    }

    fn intrinsic_width(&self) -> u32 {
        self.info.width
    }

    fn intrinsic_height(&self) -> u32 {
        self.info.height
    }
}

impl DrawableBackend for FakeDrawable {
    fn animation_info(&self) -> &AnimationInformation {
        &self.info
    }

    fn draw_frame(&self, _canvas: &mut dyn FrameCanvas, _frame: u32) -> bool {
        self.draw_ok.load(Ordering::SeqCst)
    }

    fn size_in_bytes(&self) -> usize {
        42
    }

    fn clear(&self) {
        self.cleared.fetch_add(1, Ordering::SeqCst);
    }

    fn preload_animation(&self, on_loaded: Option<&dyn Fn()>) {
        self.preloaded.fetch_add(1, Ordering::SeqCst);
        if let Some(done) = on_loaded {
            done();
        }
    }
}

#[derive(Default)]
struct CountingListener {
    fired: AtomicUsize,
}

impl CountingListener {
    fn fired(&self) -> usize {
        self.fired.load(Ordering::SeqCst)
    }
}

impl InactivityListener for CountingListener {
    fn on_inactive(&self) {
        self.fired.fetch_add(1, Ordering::SeqCst);
    }
}

struct Fixture {
    inner: Arc<FakeDrawable>,
    sched: Arc<ManualScheduler>,
    listener: Arc<CountingListener>,
    backend: InactivityCheckBackend<FakeDrawable>,
}

fn fixture() -> Fixture {
    let clock = Arc::new(ManualClock::new(0));
    let sched = Arc::new(ManualScheduler::new(Arc::clone(&clock)));
    let inner = FakeDrawable::new();
    let backend = InactivityCheckBackend::new(
        Arc::clone(&inner),
        clock,
        sched.clone(),
        InactivityOpts::default(),
    )
    .unwrap();
    let listener = Arc::new(CountingListener::default());
    backend.set_inactivity_listener(Some(listener.clone()));
    Fixture {
        inner,
        sched,
        listener,
        backend,
    }
}

fn draw(f: &Fixture) -> bool {
    f.backend.draw_frame(&mut SnapshotCanvas::new(), 0)
}

#[test]
fn draw_schedules_a_single_check() {
    let f = fixture();
    assert!(!f.backend.is_check_scheduled());
    assert!(draw(&f));
    assert!(f.backend.is_check_scheduled());
    assert_eq!(f.sched.next_due_ms(), Some(1000));

    draw(&f);
    draw(&f);
    assert_eq!(f.sched.pending(), 1);
}

#[test]
fn idle_animation_fires_listener_once() {
    let f = fixture();
    draw(&f);

    f.sched.advance(1000);
    assert_eq!(f.listener.fired(), 0);
    assert_eq!(f.sched.next_due_ms(), Some(2000));

    f.sched.advance(1000);
    assert_eq!(f.listener.fired(), 0);

    f.sched.advance(1000);
    assert_eq!(f.listener.fired(), 1);
    assert!(!f.backend.is_check_scheduled());
    assert_eq!(f.sched.pending(), 0);

    f.sched.advance(10_000);
    assert_eq!(f.listener.fired(), 1);
}

#[test]
fn draw_between_checks_resets_baseline() {
    let f = fixture();
    draw(&f);
    f.sched.advance(1500);
    draw(&f);
    assert_eq!(f.backend.last_drawn_ms(), 1500);
    assert_eq!(f.sched.pending(), 1);

    f.sched.advance(500);
    assert_eq!(f.listener.fired(), 0);
    f.sched.advance(1000);
    assert_eq!(f.listener.fired(), 0);
    f.sched.advance(1000);
    assert_eq!(f.listener.fired(), 1);
}

#[test]
fn failed_draw_does_not_arm_watchdog() {
    let f = fixture();
    f.inner.draw_ok.store(false, Ordering::SeqCst);
    assert!(!draw(&f));
    assert!(!f.backend.is_check_scheduled());
    assert_eq!(f.sched.pending(), 0);
}

#[test]
fn draw_after_inactivity_rearms_watchdog() {
    let f = fixture();
    draw(&f);
    f.sched.advance(5000);
    assert_eq!(f.listener.fired(), 1);

    draw(&f);
    assert!(f.backend.is_check_scheduled());
    f.sched.advance(5000);
    assert_eq!(f.listener.fired(), 2);
}

#[test]
fn listener_registration_replaces_previous() {
    let f = fixture();
    let second = Arc::new(CountingListener::default());
    f.backend.set_inactivity_listener(Some(second.clone()));
    draw(&f);
    f.sched.advance(5000);
    assert_eq!(f.listener.fired(), 0);
    assert_eq!(second.fired(), 1);

    f.backend.set_inactivity_listener(None);
    draw(&f);
    f.sched.advance(5000);
    assert_eq!(second.fired(), 1);
    assert!(!f.backend.is_check_scheduled());
}

#[test]
fn pending_check_outliving_backend_is_harmless() {
    let f = fixture();
    draw(&f);
    let Fixture {
        sched, backend, ..
    } = f;
    drop(backend);
    assert_eq!(sched.advance(5000), 1);
    assert_eq!(sched.pending(), 0);
}

#[test]
fn calls_are_forwarded() {
    let f = fixture();
    assert_eq!(f.backend.frame_count(), 4);
    assert_eq!(f.backend.intrinsic_width(), 2);
    assert_eq!(f.backend.intrinsic_height(), 3);
    assert_eq!(f.backend.backend_id(), f.inner.backend_id());
    assert_eq!(f.backend.size_in_bytes(), 42);
    f.backend.clear();
    assert_eq!(f.inner.cleared.load(Ordering::SeqCst), 1);

    let loaded = AtomicBool::new(false);
    f.backend
        .preload_animation(Some(&|| loaded.store(true, Ordering::SeqCst)));
    assert!(loaded.load(Ordering::SeqCst));
    assert_eq!(f.inner.preloaded.load(Ordering::SeqCst), 1);
}

#[test]
fn zero_polling_interval_is_rejected() {
    let clock = Arc::new(ManualClock::new(0));
    let sched = Arc::new(ManualScheduler::new(Arc::clone(&clock)));
    let opts = InactivityOpts {
        polling_ms: 0,
        ..InactivityOpts::default()
    };
    assert!(matches!(
        InactivityCheckBackend::new(FakeDrawable::new(), clock, sched, opts),
        Err(AnimError::Validation(_))
    ));
}
