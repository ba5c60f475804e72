use crate::foundation::core::IntRect;
use crate::render::bitmap::Bitmap;
use crate::render::blend::BlendMode;

/// Surface the animation backend draws finished frames onto.
///
/// Implemented by the host's canvas or view; [`Bitmap`] implements it for off-screen use.
pub trait DrawTarget {
    /// Draw `src` of `bitmap` scaled into `dst` on this surface.
    fn draw(&mut self, bitmap: &Bitmap, src: IntRect, dst: IntRect);

    /// Width of the drawing surface in pixels.
    fn width(&self) -> u32;

    /// Height of the drawing surface in pixels.
    fn height(&self) -> u32;
}

impl DrawTarget for Bitmap {
    fn draw(&mut self, bitmap: &Bitmap, src: IntRect, dst: IntRect) {
        self.composite(bitmap, src, dst, BlendMode::SrcOver);
    }

    fn width(&self) -> u32 {
        Bitmap::width(self)
    }

    fn height(&self) -> u32 {
        Bitmap::height(self)
    }
}
