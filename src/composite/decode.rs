use serde::{Deserialize, Serialize};

use crate::composite::compositor::{AnimatedImageCompositor, CompositorCallback, NoCachedFrames};
use crate::composite::drawer::FrameDrawer;
use crate::foundation::error::AnimResult;
use crate::render::bitmap::BitmapRef;
use crate::render::factory::BitmapFactory;
use crate::source::image::ImageHandle;
use crate::source::result::AnimatedImageResult;

/// Which frames to render eagerly when an image is decoded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DecodeOpts {
    /// Composite every frame up front.
    pub decode_all_frames: bool,
    /// Composite the preview frame up front.
    pub decode_preview_frame: bool,
    /// Preview the last frame instead of the first.
    pub use_last_frame_for_preview: bool,
}

struct DecodedSoFar<'a> {
    frames: &'a [BitmapRef],
}

impl CompositorCallback for DecodedSoFar<'_> {
    fn cached_bitmap(&mut self, frame: usize) -> Option<BitmapRef> {
        self.frames.get(frame).cloned()
    }
}

/// Composite every frame of `image` at canvas size, in order.
///
/// Each frame starts from its already composited predecessors, so the walk back never goes
/// further than one frame.
pub fn decode_all_frames(
    image: &ImageHandle,
    factory: &dyn BitmapFactory,
) -> AnimResult<Vec<BitmapRef>> {
    let mut compositor = AnimatedImageCompositor::new(FrameDrawer::new(image.clone(), None));
    let mut frames = Vec::with_capacity(image.frame_count());
    for index in 0..image.frame_count() {
        let mut bitmap = factory.create_bitmap(image.width(), image.height())?;
        compositor.render_frame(index, &mut bitmap, &mut DecodedSoFar { frames: &frames })?;
        frames.push(BitmapRef::new(bitmap));
    }
    Ok(frames)
}

/// Composite a single `frame` of `image` at canvas size, building up from frame 0.
pub fn create_preview_bitmap(
    image: &ImageHandle,
    frame: usize,
    factory: &dyn BitmapFactory,
) -> AnimResult<BitmapRef> {
    let mut compositor = AnimatedImageCompositor::new(FrameDrawer::new(image.clone(), None));
    let mut bitmap = factory.create_bitmap(image.width(), image.height())?;
    compositor.render_frame(frame, &mut bitmap, &mut NoCachedFrames)?;
    Ok(BitmapRef::new(bitmap))
}

/// Wrap `image` with the eagerly rendered frames `opts` asks for.
#[tracing::instrument(skip(image, factory), fields(image = image.cache_key().0))]
pub fn decode_animated_image(
    image: ImageHandle,
    opts: &DecodeOpts,
    factory: &dyn BitmapFactory,
) -> AnimResult<AnimatedImageResult> {
    let frame_for_preview = if opts.use_last_frame_for_preview {
        image.frame_count().saturating_sub(1)
    } else {
        0
    };

    let mut result = AnimatedImageResult::for_image(image.clone());
    if opts.decode_all_frames {
        let frames = decode_all_frames(&image, factory)?;
        if let Some(preview) = frames.get(frame_for_preview).cloned() {
            result = result.with_preview(frame_for_preview, preview);
        }
        result = result.with_decoded_frames(frames);
    }
    if opts.decode_preview_frame && result.preview_bitmap().is_none() {
        let preview = create_preview_bitmap(&image, frame_for_preview, factory)?;
        result = result.with_preview(frame_for_preview, preview);
    }
    tracing::debug!(
        decoded = opts.decode_all_frames,
        preview = result.preview_bitmap().is_some(),
        "decoded animated image"
    );
    Ok(result)
}

#[cfg(test)]
#[path = "../../tests/unit/composite/decode.rs"]
mod tests;
