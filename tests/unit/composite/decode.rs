use super::*;
use crate::cache::key::ImageCacheKey;
use crate::foundation::core::Rgba8Premul;
use crate::foundation::error::AnimError;
use crate::render::bitmap::Bitmap;
use crate::render::factory::HeapBitmapFactory;
use crate::source::frame_info::DisposalMethod;
use crate::source::memory::{MemoryAnimatedImage, MemoryFrame};

fn image() -> ImageHandle {
    let red = Rgba8Premul::opaque(255, 0, 0);
    let blue = Rgba8Premul::opaque(0, 0, 255);
    let green = Rgba8Premul::opaque(0, 255, 0);
    let image = MemoryAnimatedImage::new(6, 6)
        .with_frame(MemoryFrame::new(Bitmap::solid(6, 6, red).unwrap()))
        .with_frame(
            MemoryFrame::new(Bitmap::solid(3, 3, blue).unwrap())
                .at(1, 1)
                .disposal(DisposalMethod::DisposeToBackground),
        )
        .with_frame(MemoryFrame::new(Bitmap::solid(2, 2, green).unwrap()).at(4, 4));
    ImageHandle::new(image, ImageCacheKey(5)).unwrap()
}

fn composite_alone(image: &ImageHandle, frame: usize) -> Bitmap {
    let mut compositor = AnimatedImageCompositor::new(FrameDrawer::new(image.clone(), None));
    let mut canvas = Bitmap::new(image.width(), image.height()).unwrap();
    compositor
        .render_frame(frame, &mut canvas, &mut NoCachedFrames)
        .unwrap();
    canvas
}

#[test]
fn decoding_all_frames_matches_compositing_each_alone() {
    let image = image();
    let frames = decode_all_frames(&image, &HeapBitmapFactory::new()).unwrap();
    assert_eq!(frames.len(), 3);
    for (index, frame) in frames.iter().enumerate() {
        assert_eq!(frame.get(), &composite_alone(&image, index), "frame {index}");
    }
}

#[test]
fn preview_uses_first_or_last_frame() {
    let image = image();
    let factory = HeapBitmapFactory::new();

    let first = decode_animated_image(
        image.clone(),
        &DecodeOpts {
            decode_preview_frame: true,
            ..DecodeOpts::default()
        },
        &factory,
    )
    .unwrap();
    assert_eq!(first.frame_for_preview(), 0);
    assert_eq!(first.preview_bitmap().unwrap().get(), &composite_alone(&image, 0));
    assert!(!first.has_decoded_frame(0));

    let last = decode_animated_image(
        image.clone(),
        &DecodeOpts {
            decode_preview_frame: true,
            use_last_frame_for_preview: true,
            ..DecodeOpts::default()
        },
        &factory,
    )
    .unwrap();
    assert_eq!(last.frame_for_preview(), 2);
    assert_eq!(last.preview_bitmap().unwrap().get(), &composite_alone(&image, 2));
}

#[test]
fn decoded_frames_double_as_preview() {
    let opts = DecodeOpts {
        decode_all_frames: true,
        decode_preview_frame: true,
        use_last_frame_for_preview: false,
    };
    let result = decode_animated_image(image(), &opts, &HeapBitmapFactory::new()).unwrap();
    let preview = result.preview_bitmap().unwrap();
    let first = result.decoded_frame(0).unwrap();
    assert!(BitmapRef::ptr_eq(&preview, &first));
}

#[test]
fn nothing_is_rendered_by_default() {
    let result =
        decode_animated_image(image(), &DecodeOpts::default(), &HeapBitmapFactory::new()).unwrap();
    assert!(result.preview_bitmap().is_none());
    assert!(result.decoded_frame(0).is_none());
}

#[test]
fn dispose_is_idempotent() {
    let opts = DecodeOpts {
        decode_all_frames: true,
        ..DecodeOpts::default()
    };
    let mut result = decode_animated_image(image(), &opts, &HeapBitmapFactory::new()).unwrap();
    assert!(result.has_decoded_frame(2));
    result.dispose();
    result.dispose();
    assert!(!result.has_decoded_frame(0));
    assert!(result.preview_bitmap().is_none());
    assert_eq!(result.image().frame_count(), 3);
}

#[test]
fn allocation_failure_aborts_decoding() {
    let opts = DecodeOpts {
        decode_all_frames: true,
        ..DecodeOpts::default()
    };
    let err = decode_animated_image(image(), &opts, &HeapBitmapFactory::with_max_bitmap_bytes(16))
        .unwrap_err();
    assert!(matches!(err, AnimError::Allocation(_)));
}

#[test]
fn opts_reject_unknown_fields() {
    let opts: DecodeOpts = serde_json::from_str(r#"{"decode_all_frames":true}"#).unwrap();
    assert!(opts.decode_all_frames);
    assert!(serde_json::from_str::<DecodeOpts>(r#"{"decode_everything":true}"#).is_err());
}
