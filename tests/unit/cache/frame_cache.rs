use super::*;
use crate::foundation::core::Rgba8Premul;
use crate::pool::counting::PoolOpts;

fn frame_bitmap(shade: u8) -> BitmapRef {
    BitmapRef::new(Bitmap::solid(4, 4, Rgba8Premul::opaque(shade, 0, 0)).unwrap())
}

fn cache() -> (AnimatedFrameCache, FramePool) {
    let pool = FramePool::new(PoolOpts::default());
    (AnimatedFrameCache::new(ImageCacheKey(42), pool.clone()), pool)
}

#[test]
fn cached_frames_are_readable_and_scoped_to_image() {
    let (frames, pool) = cache();
    let other = AnimatedFrameCache::new(ImageCacheKey(7), pool);
    let _held = frames.cache(0, &frame_bitmap(10)).unwrap();

    assert!(frames.contains(0));
    assert!(!frames.contains(1));
    assert!(!other.contains(0));
    assert_eq!(frames.get(0).unwrap().pixel(0, 0).unwrap().r, 10);
}

#[test]
fn free_list_is_filled_on_last_release_in_release_order() {
    let (frames, _pool) = cache();
    let r0 = frames.cache(0, &frame_bitmap(0)).unwrap();
    let r1 = frames.cache(1, &frame_bitmap(1)).unwrap();
    let r2 = frames.cache(2, &frame_bitmap(2)).unwrap();
    assert_eq!(frames.free_count(), 0);

    drop(r2);
    drop(r0);
    drop(r1);
    assert_eq!(frames.free_count(), 3);

    assert_eq!(frames.get_for_reuse().unwrap().pixel(0, 0).unwrap().r, 2);
    assert_eq!(frames.get_for_reuse().unwrap().pixel(0, 0).unwrap().r, 0);
    assert_eq!(frames.get_for_reuse().unwrap().pixel(0, 0).unwrap().r, 1);
    assert!(frames.get_for_reuse().is_none());
    assert!(!frames.contains(0));
}

#[test]
fn reacquired_frame_leaves_free_list() {
    let (frames, _pool) = cache();
    drop(frames.cache(0, &frame_bitmap(0)).unwrap());
    assert_eq!(frames.free_count(), 1);

    let viewer = frames.get(0).unwrap();
    assert_eq!(frames.free_count(), 0);
    assert!(frames.get_for_reuse().is_none());

    // The buffer handed to the viewer is untouched.
    assert_eq!(viewer.pixel(0, 0).unwrap().r, 0);
}

#[test]
fn reuse_never_returns_a_buffer_referenced_elsewhere() {
    let (frames, _pool) = cache();
    let mut live = Vec::new();
    for frame in 0..6 {
        let r = frames.cache(frame, &frame_bitmap(frame as u8)).unwrap();
        if frame % 2 == 0 {
            live.push(r);
        }
    }

    let mut reused = Vec::new();
    while let Some(bitmap) = frames.get_for_reuse() {
        reused.push(bitmap);
    }
    assert_eq!(reused.len(), 3);
    for bitmap in &reused {
        for held in &live {
            assert_ne!(bitmap.data().as_ptr(), held.data().as_ptr());
        }
    }
}

#[test]
fn evicted_slot_is_skipped_by_reuse() {
    let (frames, pool) = cache();
    drop(frames.cache(0, &frame_bitmap(0)).unwrap());
    drop(frames.cache(1, &frame_bitmap(1)).unwrap());

    pool.trim_exclusive(1, usize::MAX);
    assert_eq!(frames.free_count(), 1);
    assert_eq!(frames.get_for_reuse().unwrap().pixel(0, 0).unwrap().r, 1);
}

#[test]
fn stale_free_key_is_retried_with_next_entry() {
    let (frames, _pool) = cache();
    let held = frames.cache(3, &frame_bitmap(3)).unwrap();
    // A notification that raced with a re-acquire: key 3 is listed but still in use.
    frames
        .free
        .on_exclusivity_changed(&FrameKey::new(ImageCacheKey(42), 3), true);
    drop(frames.cache(4, &frame_bitmap(4)).unwrap());

    let bitmap = frames.get_for_reuse().unwrap();
    assert_eq!(bitmap.pixel(0, 0).unwrap().r, 4);
    assert!(frames.contains(3));
    assert_eq!(held.pixel(0, 0).unwrap().r, 3);
}
