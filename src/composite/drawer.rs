use crate::foundation::core::{IntRect, Size};
use crate::foundation::error::{AnimError, AnimResult};
use crate::foundation::math::scale_round;
use crate::render::bitmap::Bitmap;
use crate::render::blend::BlendMode;
use crate::source::frame_info::{BlendOperation, FrameInfo};
use crate::source::image::ImageHandle;

/// Cumulative drawing counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CompositorStats {
    /// Scratch buffer (re)allocations.
    pub scratch_allocations: u64,
    /// Frames drawn onto a canvas.
    pub frames_composited: u64,
    /// Invisible or zero-area frames skipped.
    pub frames_skipped: u64,
}

/// Draws single frames of one image onto a canvas at the rendered size.
///
/// Frame rectangles are given in image canvas coordinates and mapped to the drawing surface by
/// scaling both edges with [`scale_round`], so adjacent frames tile and disposal clears exactly
/// what was drawn.
pub struct FrameDrawer {
    image: ImageHandle,
    rendered: Size,
    scratch: Option<Bitmap>,
    stats: CompositorStats,
}

impl FrameDrawer {
    /// Drawer for `image` fitted to `bounds`; the rendered size never exceeds the image canvas.
    pub fn new(image: ImageHandle, bounds: Option<IntRect>) -> Self {
        let canvas = image.canvas_size();
        let rendered = match bounds {
            Some(bounds) if !bounds.is_empty() => bounds.size().min(canvas),
            _ => canvas,
        };
        Self {
            image,
            rendered,
            scratch: None,
            stats: CompositorStats::default(),
        }
    }

    /// Image being drawn.
    pub fn image(&self) -> &ImageHandle {
        &self.image
    }

    /// Size frames are composited at.
    pub fn rendered_size(&self) -> Size {
        self.rendered
    }

    /// Counters since construction.
    pub fn stats(&self) -> CompositorStats {
        self.stats
    }

    /// Bytes held by the scratch buffer.
    pub fn scratch_bytes(&self) -> usize {
        self.scratch.as_ref().map_or(0, Bitmap::size_in_bytes)
    }

    fn target_size(&self, surface: Size) -> Size {
        self.rendered.min(surface)
    }

    /// Rectangle `info` occupies on a surface of `surface` pixels.
    pub fn frame_rect(&self, info: &FrameInfo, surface: Size) -> IntRect {
        let target = self.target_size(surface);
        let canvas = self.image.canvas_size();
        let sx = |v: i32| scale_round(v, target.width, canvas.width);
        let sy = |v: i32| scale_round(v, target.height, canvas.height);
        IntRect::new(
            sx(info.x_offset),
            sy(info.y_offset),
            sx(info.x_offset.saturating_add(info.width)),
            sy(info.y_offset.saturating_add(info.height)),
        )
    }

    /// Draw frame `frame` over `canvas` following its blend operation.
    pub fn draw_frame(&mut self, frame: usize, canvas: &mut Bitmap) -> AnimResult<()> {
        let info = self.image.frame_info(frame)?;
        let dst = self.frame_rect(&info, canvas.size());
        if !info.is_visible() || dst.is_empty() {
            self.stats.frames_skipped += 1;
            tracing::trace!(frame, "skipping invisible frame");
            return Ok(());
        }

        let (render_w, render_h) = if self.image.supports_scaling() {
            (dst.size().width, dst.size().height)
        } else {
            (info.width as u32, info.height as u32)
        };

        let mut producer = self.image.frame(frame)?;
        let scratch = prepare_scratch(&mut self.scratch, &mut self.stats, render_w, render_h)?;
        let rendered = producer.render(render_w, render_h, scratch);
        producer.dispose();
        rendered?;

        if info.blend_operation == BlendOperation::NoBlend {
            canvas.clear_rect(dst);
        }
        let src = IntRect::from_size(Size::new(render_w, render_h));
        canvas.composite(scratch, src, dst, BlendMode::SrcOver);
        self.stats.frames_composited += 1;
        Ok(())
    }

    /// Clear the rectangle `info` occupied on `canvas`.
    pub fn dispose_to_background(&self, canvas: &mut Bitmap, info: &FrameInfo) {
        canvas.clear_rect(self.frame_rect(info, canvas.size()));
    }
}

fn prepare_scratch<'a>(
    slot: &'a mut Option<Bitmap>,
    stats: &mut CompositorStats,
    width: u32,
    height: u32,
) -> AnimResult<&'a mut Bitmap> {
    let current = slot.as_ref().map(|s| (s.width(), s.height()));
    match current {
        Some((w, h)) if w >= width && h >= height => {}
        current => {
            let (w, h) = current.unwrap_or((0, 0));
            // Drop the old buffer before growing into the larger one.
            *slot = None;
            *slot = Some(Bitmap::new(w.max(width), h.max(height))?);
            stats.scratch_allocations += 1;
        }
    }
    let scratch = slot
        .as_mut()
        .ok_or_else(|| AnimError::render("scratch buffer unavailable"))?;
    scratch.erase();
    Ok(scratch)
}
