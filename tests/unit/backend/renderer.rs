use super::*;
use crate::cache::bitmap_cache::FrameType;
use crate::cache::frame_cache::{AnimatedFrameCache, FramePool};
use crate::cache::key::ImageCacheKey;
use crate::cache::no_op::NoOpCache;
use crate::cache::pooled::PooledFrameCache;
use crate::composite::decode::{DecodeOpts, decode_animated_image};
use crate::composite::compositor::NoCachedFrames;
use crate::foundation::core::Rgba8Premul;
use crate::pool::counting::PoolOpts;
use crate::render::factory::HeapBitmapFactory;
use crate::source::image::ImageHandle;
use crate::source::memory::{DisposeCounters, MemoryAnimatedImage, MemoryFrame};

fn frames() -> MemoryAnimatedImage {
    let color = |r| Rgba8Premul::opaque(r, 0, 0);
    MemoryAnimatedImage::new(8, 8)
        .with_frame(MemoryFrame::new(Bitmap::solid(8, 8, color(10)).unwrap()))
        .with_frame(MemoryFrame::new(Bitmap::solid(4, 4, color(20)).unwrap()).at(4, 4))
        .with_frame(MemoryFrame::new(Bitmap::solid(2, 2, color(30)).unwrap()))
}

fn image() -> (ImageHandle, DisposeCounters) {
    let image = frames();
    let counters = image.counters();
    (ImageHandle::new(image, ImageCacheKey(8)).unwrap(), counters)
}

fn result(image: &ImageHandle, decode_all_frames: bool) -> Arc<AnimatedImageResult> {
    let opts = DecodeOpts {
        decode_all_frames,
        ..DecodeOpts::default()
    };
    Arc::new(decode_animated_image(image.clone(), &opts, &HeapBitmapFactory::new()).unwrap())
}

fn expected(image: &ImageHandle, frame: usize) -> Bitmap {
    let mut compositor = AnimatedImageCompositor::new(FrameDrawer::new(image.clone(), None));
    let mut canvas = Bitmap::new(8, 8).unwrap();
    compositor
        .render_frame(frame, &mut canvas, &mut NoCachedFrames)
        .unwrap();
    canvas
}

#[test]
fn renders_fully_composited_frames() {
    let (image, _) = image();
    let renderer = CompositingFrameRenderer::new(result(&image, false), Arc::new(NoOpCache));
    let mut bitmap = Bitmap::new(8, 8).unwrap();
    assert!(renderer.render_frame(2, &mut bitmap));
    assert_eq!(bitmap, expected(&image, 2));
    assert_eq!(bitmap.pixel(5, 5).unwrap().r, 20);
    assert!(renderer.scratch_bytes() > 0);
}

#[test]
fn predecoded_frames_are_copied_without_rendering() {
    let (image, counters) = image();
    let with_frames = Arc::new(
        AnimatedImageResult::for_image(image.clone()).with_decoded_frames(vec![
            BitmapRef::new(expected(&image, 0)),
            BitmapRef::new(expected(&image, 1)),
        ]),
    );
    let before = counters.frame_renders();

    let renderer = CompositingFrameRenderer::new(with_frames, Arc::new(NoOpCache));
    let mut bitmap = Bitmap::new(8, 8).unwrap();
    assert!(renderer.render_frame(1, &mut bitmap));
    assert_eq!(counters.frame_renders(), before);
    assert_eq!(bitmap, expected(&image, 1));
}

#[test]
fn cached_composites_shorten_the_walk() {
    let (image, counters) = image();
    let pool = FramePool::new(PoolOpts::default());
    let cache = Arc::new(PooledFrameCache::new(
        AnimatedFrameCache::new(image.cache_key(), pool),
        true,
    ));
    cache.on_frame_rendered(1, &BitmapRef::new(expected(&image, 1)), FrameType::Created);
    let renderer = CompositingFrameRenderer::new(result(&image, false), cache);

    let before = counters.frame_renders();
    let mut bitmap = Bitmap::new(8, 8).unwrap();
    assert!(renderer.render_frame(2, &mut bitmap));
    assert_eq!(counters.frame_renders() - before, 1);
    assert_eq!(bitmap, expected(&image, 2));
}

#[test]
fn render_failure_returns_false() {
    let image = ImageHandle::new(frames().with_failing_frame(1), ImageCacheKey(9)).unwrap();
    let renderer = CompositingFrameRenderer::new(result(&image, false), Arc::new(NoOpCache));
    let mut bitmap = Bitmap::new(8, 8).unwrap();
    assert!(!renderer.render_frame(2, &mut bitmap));
    assert!(!renderer.render_frame(99, &mut bitmap));
}

#[test]
fn bounds_change_the_rendered_size() {
    let (image, _) = image();
    let renderer = CompositingFrameRenderer::new(result(&image, true), Arc::new(NoOpCache));
    assert_eq!(renderer.intrinsic_width(), Some(8));

    renderer.set_bounds(Some(IntRect::from_xywh(0, 0, 4, 4)));
    assert_eq!(renderer.rendered_size(), Size::new(4, 4));
    assert_eq!(renderer.intrinsic_height(), Some(4));

    // Decoded frames are canvas sized, so the compositor takes over at the smaller size.
    let mut bitmap = Bitmap::new(4, 4).unwrap();
    assert!(renderer.render_frame(1, &mut bitmap));
    assert_eq!(bitmap.pixel(0, 0).unwrap().r, 10);
    assert_eq!(bitmap.pixel(3, 3).unwrap().r, 20);

    renderer.set_bounds(None);
    assert_eq!(renderer.rendered_size(), Size::new(8, 8));
}
