use crate::render::bitmap::BitmapRef;
use crate::source::image::ImageHandle;

/// A decoded image together with optional eagerly rendered frames.
#[derive(Clone, Debug)]
pub struct AnimatedImageResult {
    image: ImageHandle,
    frame_for_preview: usize,
    preview: Option<BitmapRef>,
    decoded_frames: Vec<BitmapRef>,
}

impl AnimatedImageResult {
    /// Result without any eagerly rendered frame.
    pub fn for_image(image: ImageHandle) -> Self {
        Self {
            image,
            frame_for_preview: 0,
            preview: None,
            decoded_frames: Vec::new(),
        }
    }

    /// Attach the preview bitmap rendered for `frame`.
    pub fn with_preview(mut self, frame: usize, preview: BitmapRef) -> Self {
        self.frame_for_preview = frame;
        self.preview = Some(preview);
        self
    }

    /// Attach fully composited frames, one per image frame.
    pub fn with_decoded_frames(mut self, frames: Vec<BitmapRef>) -> Self {
        self.decoded_frames = frames;
        self
    }

    /// The decoded image.
    pub fn image(&self) -> &ImageHandle {
        &self.image
    }

    /// Frame the preview shows.
    pub fn frame_for_preview(&self) -> usize {
        self.frame_for_preview
    }

    /// Preview bitmap, if one was rendered.
    pub fn preview_bitmap(&self) -> Option<BitmapRef> {
        self.preview.clone()
    }

    /// Fully composited `frame`, if frames were decoded ahead of time.
    pub fn decoded_frame(&self, frame: usize) -> Option<BitmapRef> {
        self.decoded_frames.get(frame).cloned()
    }

    /// Return `true` when `frame` was decoded ahead of time.
    pub fn has_decoded_frame(&self, frame: usize) -> bool {
        frame < self.decoded_frames.len()
    }

    /// Release the preview and decoded frames. Safe to call repeatedly.
    pub fn dispose(&mut self) {
        self.preview = None;
        self.decoded_frames.clear();
    }
}
