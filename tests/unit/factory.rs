use super::*;
use crate::backend::scheduler::ManualScheduler;
use crate::backend::{AnimationBackend, DrawableBackend, SnapshotCanvas};
use crate::bitmap::handle::Bitmap;
use crate::foundation::clock::ManualClock;
use crate::prepare::executor::QueueExecutor;

struct SolidRenderer;

impl FrameRenderer for SolidRenderer {
    fn render_frame(&self, frame: u32, bitmap: &mut Bitmap) -> bool {
        bitmap.fill(&[frame as u8, 0, 0, 255]);
        true
    }

    fn intrinsic_width(&self) -> Option<u32> {
        None
    }

    fn intrinsic_height(&self) -> Option<u32> {
        None
    }
}

fn info() -> AnimationInformation {
    AnimationInformation {
        frame_count: 6,
        frame_durations_ms: vec![40],
        loop_count: None,
        width: 8,
        height: 6,
    }
}

struct Harness {
    alloc: HeapBitmapAllocator,
    exec: Arc<QueueExecutor>,
    sched: Arc<ManualScheduler>,
    factory: AnimationFactory,
}

fn harness(opts: AnimationOpts) -> Harness {
    let clock = Arc::new(ManualClock::new(0));
    let sched = Arc::new(ManualScheduler::new(Arc::clone(&clock)));
    let alloc = HeapBitmapAllocator::default();
    let exec = Arc::new(QueueExecutor::new());
    let factory = AnimationFactory::with_parts(
        opts,
        FactoryParts {
            allocator: Arc::new(alloc.clone()),
            executor: exec.clone(),
            clock,
            scheduler: sched.clone(),
        },
    )
    .unwrap();
    Harness {
        alloc,
        exec,
        sched,
        factory,
    }
}

fn opts(strategy: CachingStrategy, frames_to_prepare: usize) -> AnimationOpts {
    AnimationOpts {
        caching_strategy: strategy,
        frames_to_prepare,
        ..AnimationOpts::default()
    }
}

#[test]
fn defaults_match_documented_values() {
    let o = AnimationOpts::default();
    assert_eq!(o.caching_strategy, CachingStrategy::NoCache);
    assert_eq!(o.frames_to_prepare, 3);
    assert_eq!(o.inactivity_threshold_ms, 2000);
    assert_eq!(o.inactivity_polling_ms, 1000);
    assert_eq!(o.preparer_threads, None);
    o.validate().unwrap();
}

#[test]
fn json_fills_missing_fields_with_defaults() {
    let o = AnimationOpts::from_json_str(
        r#"{ "caching_strategy": "shared_pool_no_reuse", "frames_to_prepare": 0 }"#,
    )
    .unwrap();
    assert_eq!(o.caching_strategy, CachingStrategy::SharedPoolNoReuse);
    assert_eq!(o.frames_to_prepare, 0);
    assert_eq!(o.inactivity_polling_ms, 1000);

    let round = serde_json::to_string(&o).unwrap();
    assert_eq!(AnimationOpts::from_json_str(&round).unwrap(), o);
}

#[test]
fn bad_options_are_rejected() {
    assert!(matches!(
        AnimationOpts::from_json_str("{ not json"),
        Err(AnimError::Config(_))
    ));
    assert!(matches!(
        AnimationOpts::from_json_str(r#"{ "caching_strategy": "everything" }"#),
        Err(AnimError::Config(_))
    ));
    assert!(matches!(
        AnimationOpts::from_json_str(r#"{ "preparer_threads": 0 }"#),
        Err(AnimError::Validation(_))
    ));
    assert!(matches!(
        AnimationOpts::from_json_str(r#"{ "inactivity_polling_ms": 0 }"#),
        Err(AnimError::Validation(_))
    ));
    assert!(matches!(
        AnimationOpts::from_json_str(r#"{ "pool_max_entries": 0 }"#),
        Err(AnimError::Validation(_))
    ));
}

#[test]
fn legacy_strategy_codes() {
    assert_eq!(CachingStrategy::from_code(0), CachingStrategy::NoCache);
    assert_eq!(CachingStrategy::from_code(1), CachingStrategy::SharedPool);
    assert_eq!(CachingStrategy::from_code(2), CachingStrategy::SharedPoolNoReuse);
    assert_eq!(CachingStrategy::from_code(3), CachingStrategy::KeepLast);
    assert_eq!(CachingStrategy::from_code(42), CachingStrategy::NoCache);
}

#[test]
fn strategy_selects_cache() {
    for (strategy, keeps_frames) in [
        (CachingStrategy::NoCache, false),
        (CachingStrategy::KeepLast, true),
        (CachingStrategy::SharedPool, true),
        (CachingStrategy::SharedPoolNoReuse, true),
    ] {
        let h = harness(opts(strategy, 0));
        let backend = h
            .factory
            .create_backend("anim.webp", info(), Arc::new(SolidRenderer))
            .unwrap();
        assert!(backend.draw_frame(&mut SnapshotCanvas::new(), 0));
        assert_eq!(backend.size_in_bytes() > 0, keeps_frames, "{strategy:?}");
        assert_eq!(h.alloc.stats().live_bitmaps > 0, keeps_frames, "{strategy:?}");
    }
}

#[test]
fn renderer_without_size_uses_animation_size() {
    let h = harness(opts(CachingStrategy::KeepLast, 0));
    let backend = h
        .factory
        .create_backend("a", info(), Arc::new(SolidRenderer))
        .unwrap();
    assert_eq!(backend.intrinsic_width(), 8);
    assert_eq!(backend.intrinsic_height(), 6);
    assert_eq!(backend.size_in_bytes(), 0);
    backend.draw_frame(&mut SnapshotCanvas::new(), 0);
    assert_eq!(backend.size_in_bytes(), 8 * 6 * 4);
}

#[test]
fn same_source_shares_pooled_frames() {
    let h = harness(opts(CachingStrategy::SharedPool, 0));
    let a = h
        .factory
        .create_backend("shared.gif", info(), Arc::new(SolidRenderer))
        .unwrap();
    let b = h
        .factory
        .create_backend("shared.gif", info(), Arc::new(SolidRenderer))
        .unwrap();
    let other = h
        .factory
        .create_backend("other.gif", info(), Arc::new(SolidRenderer))
        .unwrap();

    a.draw_frame(&mut SnapshotCanvas::new(), 2);
    assert!(b.inner().cache().contains(2));
    assert!(!other.inner().cache().contains(2));
    assert_eq!(h.factory.store().len(), 1);
}

#[test]
fn frames_to_prepare_enables_preparation() {
    let h = harness(opts(CachingStrategy::SharedPool, 2));
    let backend = h
        .factory
        .create_backend("p", info(), Arc::new(SolidRenderer))
        .unwrap();
    backend.draw_frame(&mut SnapshotCanvas::new(), 5);
    assert_eq!(h.exec.pending(), 2);
    h.exec.run_all();
    assert!(backend.inner().cache().contains(0));
    assert!(backend.inner().cache().contains(1));

    let h = harness(opts(CachingStrategy::SharedPool, 0));
    let backend = h
        .factory
        .create_backend("p", info(), Arc::new(SolidRenderer))
        .unwrap();
    backend.draw_frame(&mut SnapshotCanvas::new(), 5);
    assert!(h.exec.is_idle());
}

#[test]
fn idle_animation_releases_its_frames() {
    let h = harness(opts(CachingStrategy::KeepLast, 0));
    let backend = h
        .factory
        .create_backend("idle", info(), Arc::new(SolidRenderer))
        .unwrap();
    backend.draw_frame(&mut SnapshotCanvas::new(), 0);
    assert_eq!(h.alloc.stats().live_bitmaps, 1);

    h.sched.advance(5000);
    assert_eq!(backend.size_in_bytes(), 0);
    assert_eq!(h.alloc.stats().live_bitmaps, 0);
}

#[test]
fn empty_animation_is_rejected() {
    let h = harness(AnimationOpts::default());
    let mut empty = info();
    empty.frame_count = 0;
    assert!(matches!(
        h.factory.create_backend("e", empty, Arc::new(SolidRenderer)),
        Err(AnimError::Validation(_))
    ));
}
