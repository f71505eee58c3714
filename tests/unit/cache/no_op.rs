use super::*;
use crate::bitmap::handle::Bitmap;
use crate::foundation::core::{BitmapDesc, PixelFormat};

fn handle() -> FrameHandle {
    FrameHandle::new(Bitmap::new(
        BitmapDesc::new(2, 2, PixelFormat::Rgba8888).unwrap(),
    ))
}

#[test]
fn every_query_is_empty_in_any_order() {
    let cache = NoOpCache::new();
    let h = handle();

    for round in 0..3u32 {
        cache.on_frame_rendered(round, &h, FrameType::Created);
        cache.on_frame_prepared(round + 1, &h, FrameType::Reused);
        assert!(cache.get_cached_frame(round).is_none());
        assert!(cache.get_fallback_frame(round).is_none());
        assert!(cache.get_bitmap_to_reuse_for_frame(round, 2, 2).is_none());
        assert!(!cache.contains(round));
        assert_eq!(cache.size_in_bytes(), 0);
        cache.clear();
        cache.clear();
    }

    // The cache never took a reference.
    assert_eq!(h.ref_count(), 1);
}
