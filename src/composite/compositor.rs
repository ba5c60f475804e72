use crate::composite::drawer::FrameDrawer;
use crate::foundation::core::IntRect;
use crate::foundation::error::{AnimError, AnimResult};
use crate::render::bitmap::{Bitmap, BitmapRef};
use crate::render::blend::BlendMode;
use crate::source::frame_info::{DisposalMethod, FrameInfo};

/// Hooks into the compositing walk.
pub trait CompositorCallback {
    /// Canvas after intermediate frame `frame` was drawn.
    fn on_intermediate_result(&mut self, _frame: usize, _canvas: &Bitmap) {}

    /// Fully composited pixels of `frame`, if known.
    fn cached_bitmap(&mut self, frame: usize) -> Option<BitmapRef>;
}

/// Callback without any cached frames.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoCachedFrames;

impl CompositorCallback for NoCachedFrames {
    fn cached_bitmap(&mut self, _frame: usize) -> Option<BitmapRef> {
        None
    }
}

enum FrameNeeded {
    // The frame's pixels survive into later frames.
    Required,
    // The frame clears the whole canvas; nothing before it matters.
    NotRequired,
    // The frame restores the previous state and leaves no trace.
    Skip,
}

/// Rebuilds fully composited frames from per-frame pixels and disposal metadata.
///
/// Not meant to be shared between threads: the drawer's scratch buffer is mutated in place.
pub struct AnimatedImageCompositor {
    drawer: FrameDrawer,
}

impl AnimatedImageCompositor {
    /// Compositor drawing through `drawer`.
    pub fn new(drawer: FrameDrawer) -> Self {
        Self { drawer }
    }

    /// Frame drawer in use.
    pub fn drawer(&self) -> &FrameDrawer {
        &self.drawer
    }

    /// Mutable frame drawer.
    pub fn drawer_mut(&mut self) -> &mut FrameDrawer {
        &mut self.drawer
    }

    /// Render the fully composited `frame` into `canvas`.
    ///
    /// The canvas is erased first. Earlier frames are replayed from the closest point where the
    /// canvas state is known: a cached composite from `callback`, a frame that resets the whole
    /// canvas, or frame 0.
    #[tracing::instrument(level = "trace", skip(self, canvas, callback))]
    pub fn render_frame(
        &mut self,
        frame: usize,
        canvas: &mut Bitmap,
        callback: &mut dyn CompositorCallback,
    ) -> AnimResult<()> {
        let image = self.drawer.image().clone();
        let frame_count = image.frame_count();
        if frame >= frame_count {
            return Err(AnimError::FrameOutOfRange { frame, frame_count });
        }

        canvas.erase();
        let info = image.frame_info(frame)?;
        let start = if frame > 0 && !info.is_keyframe(image.canvas_size()) {
            self.prepare_canvas_with_closest_cached_frame(frame - 1, canvas, callback)?
        } else {
            frame
        };

        for index in start..frame {
            let info = image.frame_info(index)?;
            if info.disposal_method == DisposalMethod::DisposeToPrevious {
                continue;
            }
            self.drawer.draw_frame(index, canvas)?;
            callback.on_intermediate_result(index, canvas);
            if info.disposal_method == DisposalMethod::DisposeToBackground {
                self.drawer.dispose_to_background(canvas, &info);
            }
        }

        self.drawer.draw_frame(frame, canvas)
    }

    /// Walk back from `previous` and return the first frame that must be replayed.
    fn prepare_canvas_with_closest_cached_frame(
        &mut self,
        previous: usize,
        canvas: &mut Bitmap,
        callback: &mut dyn CompositorCallback,
    ) -> AnimResult<usize> {
        let image = self.drawer.image().clone();
        let canvas_size = image.canvas_size();
        for index in (0..=previous).rev() {
            let info = image.frame_info(index)?;
            match self.frame_needed(&info) {
                FrameNeeded::Required => {
                    if let Some(cached) = callback.cached_bitmap(index) {
                        if cached.size() == canvas.size() {
                            copy_into(canvas, &cached);
                            if info.disposal_method == DisposalMethod::DisposeToBackground {
                                self.drawer.dispose_to_background(canvas, &info);
                            }
                            return Ok(index + 1);
                        }
                        tracing::trace!(frame = index, "cached composite has a different size");
                    }
                    if info.is_keyframe(canvas_size) {
                        return Ok(index);
                    }
                }
                FrameNeeded::NotRequired => return Ok(index + 1),
                FrameNeeded::Skip => {}
            }
        }
        Ok(0)
    }

    fn frame_needed(&self, info: &FrameInfo) -> FrameNeeded {
        match info.disposal_method {
            DisposalMethod::DoNotDispose => FrameNeeded::Required,
            DisposalMethod::DisposeToBackground => {
                if info.covers(self.drawer.image().canvas_size()) {
                    FrameNeeded::NotRequired
                } else {
                    FrameNeeded::Required
                }
            }
            DisposalMethod::DisposeToPrevious => FrameNeeded::Skip,
        }
    }
}

/// Copy `bitmap` into the top-left corner of `canvas`, replacing what was there.
pub(crate) fn copy_into(canvas: &mut Bitmap, bitmap: &Bitmap) {
    canvas.composite(bitmap, bitmap.bounds(), IntRect::from_size(bitmap.size()), BlendMode::Src);
}

#[cfg(test)]
#[path = "../../tests/unit/composite/compositor.rs"]
mod tests;
