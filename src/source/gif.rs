use std::io::Cursor;

use image::codecs::gif::GifDecoder;
use image::{AnimationDecoder, ImageDecoder};
use rayon::prelude::*;

use crate::foundation::error::{AnimError, AnimResult};
use crate::render::bitmap::Bitmap;
use crate::source::frame_info::{BlendOperation, DisposalMethod};
use crate::source::memory::{MemoryAnimatedImage, MemoryFrame};

/// Decode an encoded GIF into memory.
///
/// The `image` crate hands out frames already composited onto the full canvas, so every frame
/// is a full-canvas `NoBlend` keyframe and the compositor never has to walk back. The GIF loop
/// extension is not exposed by the decoder; the result loops forever.
#[tracing::instrument(skip(bytes), fields(bytes = bytes.len()))]
pub fn decode_gif(bytes: &[u8]) -> AnimResult<MemoryAnimatedImage> {
    let decoder = GifDecoder::new(Cursor::new(bytes))
        .map_err(|e| AnimError::decode(format!("gif header: {e}")))?;
    let (width, height) = decoder.dimensions();
    let frames = decoder
        .into_frames()
        .collect_frames()
        .map_err(|e| AnimError::decode(format!("gif frames: {e}")))?;
    if frames.is_empty() {
        return Err(AnimError::decode("gif contains no frames"));
    }

    let converted = frames
        .into_par_iter()
        .map(|frame| -> AnimResult<MemoryFrame> {
            let (numer, denom) = frame.delay().numer_denom_ms();
            let duration_ms = numer.checked_div(denom).unwrap_or(0);
            let (x, y) = (frame.left(), frame.top());
            let pixels = Bitmap::from_rgba_image(frame.buffer())?;
            Ok(MemoryFrame::new(pixels)
                .at(
                    i32::try_from(x).unwrap_or(i32::MAX),
                    i32::try_from(y).unwrap_or(i32::MAX),
                )
                .blend(BlendOperation::NoBlend)
                .disposal(DisposalMethod::DoNotDispose)
                .duration_ms(duration_ms))
        })
        .collect::<AnimResult<Vec<_>>>()?;

    tracing::debug!(width, height, frames = converted.len(), "decoded gif");
    Ok(converted
        .into_iter()
        .fold(MemoryAnimatedImage::new(width, height), |image, frame| {
            image.with_frame(frame)
        }))
}

#[cfg(test)]
#[path = "../../tests/unit/source/gif.rs"]
mod tests;
