use std::sync::Arc;

use parking_lot::Mutex;

use crate::cache::bitmap_cache::BitmapFrameCache;
use crate::composite::compositor::{AnimatedImageCompositor, CompositorCallback, copy_into};
use crate::composite::drawer::FrameDrawer;
use crate::foundation::core::{IntRect, Size};
use crate::render::bitmap::{Bitmap, BitmapRef};
use crate::source::result::AnimatedImageResult;

/// Produces fully composited frames into caller-provided bitmaps.
pub trait FrameRenderer: Send + Sync {
    /// Render `frame` into `bitmap`. Failures are logged and reported as `false`.
    fn render_frame(&self, frame: usize, bitmap: &mut Bitmap) -> bool;

    /// Natural output width, if the renderer has one.
    fn intrinsic_width(&self) -> Option<u32>;

    /// Natural output height, if the renderer has one.
    fn intrinsic_height(&self) -> Option<u32>;

    /// Fit future output to `bounds`.
    fn set_bounds(&self, bounds: Option<IntRect>);
}

struct RendererState {
    bounds: Option<IntRect>,
    rendered: Size,
    idle: Vec<AnimatedImageCompositor>,
}

struct CacheLookup<'a> {
    cache: &'a dyn BitmapFrameCache,
}

impl CompositorCallback for CacheLookup<'_> {
    fn cached_bitmap(&mut self, frame: usize) -> Option<BitmapRef> {
        self.cache.cached_frame(frame)
    }
}

/// [`FrameRenderer`] backed by the compositor.
///
/// Frames decoded ahead of time are copied straight out of the decode result. Otherwise a
/// compositor is checked out for the duration of one render, starting from the closest frame
/// the cache still holds. The render thread and the preparation worker each get their own
/// compositor, so neither waits on the other's scratch buffer.
pub struct CompositingFrameRenderer {
    result: Arc<AnimatedImageResult>,
    cache: Arc<dyn BitmapFrameCache>,
    state: Mutex<RendererState>,
}

impl CompositingFrameRenderer {
    /// Renderer for `result`, consulting `cache` for earlier composites.
    pub fn new(result: Arc<AnimatedImageResult>, cache: Arc<dyn BitmapFrameCache>) -> Self {
        let rendered = result.image().canvas_size();
        Self {
            result,
            cache,
            state: Mutex::new(RendererState {
                bounds: None,
                rendered,
                idle: Vec::new(),
            }),
        }
    }

    /// Size frames are rendered at.
    pub fn rendered_size(&self) -> Size {
        self.state.lock().rendered
    }

    /// Bytes held by idle compositors' scratch buffers.
    pub fn scratch_bytes(&self) -> usize {
        self.state
            .lock()
            .idle
            .iter()
            .map(|c| c.drawer().scratch_bytes())
            .sum()
    }

    fn checkout(&self) -> AnimatedImageCompositor {
        let mut state = self.state.lock();
        match state.idle.pop() {
            Some(compositor) => compositor,
            None => AnimatedImageCompositor::new(FrameDrawer::new(
                self.result.image().clone(),
                state.bounds,
            )),
        }
    }

    fn check_in(&self, compositor: AnimatedImageCompositor) {
        let mut state = self.state.lock();
        // Bounds changed mid-render: the compositor is stale.
        if compositor.drawer().rendered_size() == state.rendered {
            state.idle.push(compositor);
        }
    }

    fn copy_decoded(&self, frame: usize, bitmap: &mut Bitmap) -> bool {
        let Some(decoded) = self.result.decoded_frame(frame) else {
            return false;
        };
        if decoded.size() != self.rendered_size() || !bitmap.fits(decoded.width(), decoded.height())
        {
            return false;
        }
        bitmap.erase();
        copy_into(bitmap, &decoded);
        true
    }
}

impl FrameRenderer for CompositingFrameRenderer {
    fn render_frame(&self, frame: usize, bitmap: &mut Bitmap) -> bool {
        if self.copy_decoded(frame, bitmap) {
            return true;
        }
        let mut compositor = self.checkout();
        let mut lookup = CacheLookup {
            cache: self.cache.as_ref(),
        };
        let rendered = compositor.render_frame(frame, bitmap, &mut lookup);
        self.check_in(compositor);
        match rendered {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!(frame, %error, "frame render failed");
                false
            }
        }
    }

    fn intrinsic_width(&self) -> Option<u32> {
        Some(self.rendered_size().width)
    }

    fn intrinsic_height(&self) -> Option<u32> {
        Some(self.rendered_size().height)
    }

    fn set_bounds(&self, bounds: Option<IntRect>) {
        let rendered = FrameDrawer::new(self.result.image().clone(), bounds).rendered_size();
        let mut state = self.state.lock();
        state.bounds = bounds;
        if state.rendered != rendered {
            tracing::debug!(
                width = rendered.width,
                height = rendered.height,
                "renderer resized"
            );
            state.rendered = rendered;
            state.idle.clear();
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/backend/renderer.rs"]
mod tests;
