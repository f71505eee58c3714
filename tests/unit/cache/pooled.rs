use super::*;
use crate::bitmap::allocator::{BitmapAllocator, HeapBitmapAllocator};
use crate::cache::store::FrameStoreOpts;
use crate::foundation::core::PixelFormat;

const FRAME_BYTES: usize = 4 * 4 * 4;

type Fixture = (HeapBitmapAllocator, Arc<AnimatedFrameStore>, PooledFrameCache);

fn setup(enable_reuse: bool) -> Fixture {
    setup_with(enable_reuse, FrameStoreOpts::default())
}

fn setup_with(enable_reuse: bool, opts: FrameStoreOpts) -> Fixture {
    let alloc = HeapBitmapAllocator::default();
    let store = Arc::new(AnimatedFrameStore::new(opts));
    let cache = PooledFrameCache::new(Arc::clone(&store), AnimationKey(11), enable_reuse);
    (alloc, store, cache)
}

fn bitmap(alloc: &HeapBitmapAllocator) -> FrameHandle {
    alloc.create_bitmap(4, 4, PixelFormat::Rgba8888).unwrap()
}

#[test]
fn prepared_frame_is_served_from_store() {
    let (alloc, store, cache) = setup(true);
    let h = bitmap(&alloc);
    cache.on_frame_prepared(3, &h, FrameType::Created);

    assert!(cache.contains(3));
    assert!(cache.get_cached_frame(3).unwrap().same_resource(&h));
    assert_eq!(cache.pending_frames(), vec![3]);
    assert_eq!(cache.size_in_bytes(), FRAME_BYTES);
    assert_eq!(store.size_in_bytes(), FRAME_BYTES);
}

#[test]
fn rendering_promotes_pending_frame() {
    let (alloc, _store, cache) = setup(true);
    let h = bitmap(&alloc);
    cache.on_frame_prepared(3, &h, FrameType::Created);
    cache.on_frame_rendered(3, &h, FrameType::Cached);

    assert!(cache.pending_frames().is_empty());
    assert!(cache.get_fallback_frame(0).unwrap().same_resource(&h));
    assert_eq!(cache.size_in_bytes(), FRAME_BYTES);
}

#[test]
fn preparing_same_frame_twice_replaces_pending_entry() {
    let (alloc, _store, cache) = setup(true);
    let a = bitmap(&alloc);
    let b = bitmap(&alloc);
    cache.on_frame_prepared(1, &a, FrameType::Created);
    cache.on_frame_prepared(1, &b, FrameType::Created);
    drop(a);

    assert_eq!(cache.pending_frames(), vec![1]);
    assert!(cache.get_cached_frame(1).unwrap().same_resource(&b));
    assert_eq!(alloc.stats().live_bitmaps, 1);
}

#[test]
fn clear_releases_pending_and_last_but_not_store() {
    let (alloc, store, cache) = setup(true);
    {
        let a = bitmap(&alloc);
        let b = bitmap(&alloc);
        cache.on_frame_rendered(0, &a, FrameType::Created);
        cache.on_frame_prepared(1, &b, FrameType::Created);
    }
    cache.clear();
    cache.clear();
    assert_eq!(cache.size_in_bytes(), 0);
    assert!(cache.get_fallback_frame(0).is_none());
    // The shared store still holds its own references.
    assert_eq!(store.len(), 2);
    assert_eq!(alloc.stats().live_bitmaps, 2);

    store.clear_animation(cache.animation_key());
    let st = alloc.stats();
    assert_eq!(st.live_bitmaps, 0);
    assert_eq!(st.total_releases, st.total_allocs);
}

#[test]
fn reuse_respects_flag() {
    let (alloc, _store, cache) = setup(false);
    {
        let h = bitmap(&alloc);
        cache.on_frame_prepared(1, &h, FrameType::Created);
    }
    cache.clear();
    assert!(cache.get_bitmap_to_reuse_for_frame(2, 4, 4).is_none());

    let (alloc, _store, cache) = setup(true);
    {
        let h = bitmap(&alloc);
        cache.on_frame_prepared(1, &h, FrameType::Created);
    }
    // Still referenced by the pending map.
    assert!(cache.get_bitmap_to_reuse_for_frame(2, 4, 4).is_none());
    cache.clear();
    let reused = cache.get_bitmap_to_reuse_for_frame(2, 4, 4).unwrap();
    assert!(!cache.contains(1));
    assert_eq!(reused.ref_count(), 1);
}

#[test]
fn prepare_after_clear_is_a_normal_insert() {
    let (alloc, _store, cache) = setup(true);
    cache.clear();
    let h = bitmap(&alloc);
    cache.on_frame_prepared(4, &h, FrameType::Reused);
    assert!(cache.contains(4));
}

#[test]
fn frames_of_other_animations_are_invisible() {
    let (alloc, store, cache) = setup(true);
    let other = PooledFrameCache::new(Arc::clone(&store), AnimationKey(12), true);
    let h = bitmap(&alloc);
    other.on_frame_prepared(0, &h, FrameType::Created);
    assert!(!cache.contains(0));
    assert!(cache.get_cached_frame(0).is_none());
}

#[test]
fn prepared_frames_survive_store_pressure() {
    let (alloc, store, cache) = setup_with(
        true,
        FrameStoreOpts {
            max_bytes: usize::MAX,
            max_entries: 2,
        },
    );
    for f in 0..3 {
        let h = bitmap(&alloc);
        cache.on_frame_prepared(f, &h, FrameType::Created);
    }

    assert_eq!(cache.pending_frames(), vec![0, 1, 2]);
    for f in 0..3 {
        assert!(cache.contains(f), "frame {f} lost");
        assert!(cache.get_cached_frame(f).is_some());
    }
    assert_eq!(store.stats().evictions, 0);
    assert_eq!(cache.size_in_bytes(), FRAME_BYTES * 3);
    assert_eq!(alloc.stats().live_bitmaps, 3);

    // Drawing frame 0 moves it from pending to last-rendered; nothing becomes evictable.
    let h0 = cache.get_cached_frame(0).unwrap();
    cache.on_frame_rendered(0, &h0, FrameType::Cached);
    drop(h0);
    assert_eq!(cache.pending_frames(), vec![1, 2]);
    assert!((0..3).all(|f| cache.contains(f)));
    assert_eq!(store.stats().evictions, 0);
}

#[test]
fn last_rendered_frame_survives_store_pressure() {
    let (alloc, store, cache) = setup_with(
        true,
        FrameStoreOpts {
            max_bytes: FRAME_BYTES,
            max_entries: 1,
        },
    );
    let mut shown = None;
    for f in 0..3 {
        let h = bitmap(&alloc);
        cache.on_frame_rendered(f, &h, FrameType::Created);
        shown = Some(h);
    }
    let shown = shown.unwrap();

    // Frame 0 was let go when frame 1 replaced it as last-rendered.
    assert!(!cache.contains(0));
    assert!(cache.contains(1));
    assert!(cache.contains(2));
    assert!(cache.get_fallback_frame(0).unwrap().same_resource(&shown));
    assert!(cache.get_cached_frame(2).unwrap().same_resource(&shown));
    assert_eq!(store.stats().evictions, 1);
    assert_eq!(cache.size_in_bytes(), FRAME_BYTES);
    assert_eq!(alloc.stats().live_bitmaps, 2);
}

#[test]
fn pressure_reclaims_frames_once_the_cache_lets_go() {
    let (alloc, store, cache) = setup_with(
        true,
        FrameStoreOpts {
            max_bytes: usize::MAX,
            max_entries: 2,
        },
    );
    for f in 0..3 {
        let h = bitmap(&alloc);
        cache.on_frame_prepared(f, &h, FrameType::Created);
    }
    cache.clear();
    assert_eq!(store.len(), 3);

    let h = bitmap(&alloc);
    cache.on_frame_prepared(3, &h, FrameType::Created);
    assert_eq!(store.len(), 2);
    assert!(!cache.contains(0));
    assert!(!cache.contains(1));
    assert!(cache.contains(2));
    assert!(cache.contains(3));
    assert_eq!(store.stats().evictions, 2);
}
