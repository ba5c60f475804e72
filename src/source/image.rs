use std::fmt;
use std::sync::Arc;

use crate::cache::key::ImageCacheKey;
use crate::foundation::core::Size;
use crate::foundation::error::{AnimError, AnimResult};
use crate::render::bitmap::Bitmap;
use crate::source::frame_info::FrameInfo;

/// Durations below this are treated as unspecified.
pub const MIN_FRAME_DURATION_MS: u32 = 11;
/// Duration substituted for unspecified ones.
pub const FRAME_DURATION_MS_FOR_MIN: u32 = 100;

/// One frame as produced by a decoder.
pub trait AnimatedFrame: Send {
    /// Frame width in canvas pixels.
    fn width(&self) -> i32;
    /// Frame height in canvas pixels.
    fn height(&self) -> i32;
    /// Left edge on the canvas.
    fn x_offset(&self) -> i32;
    /// Top edge on the canvas.
    fn y_offset(&self) -> i32;

    /// Render this frame's own pixels, scaled to `width x height`, into the top-left corner of
    /// `target`. Pixels outside that area are left untouched.
    fn render(&mut self, width: u32, height: u32, target: &mut Bitmap) -> AnimResult<()>;

    /// Release decoder resources. Called at most once.
    fn dispose(&mut self) {}
}

/// A decoded animated image.
pub trait AnimatedImage: Send + Sync {
    /// Number of frames; at least one.
    fn frame_count(&self) -> usize;
    /// Canvas width.
    fn width(&self) -> u32;
    /// Canvas height.
    fn height(&self) -> u32;
    /// Loop count; 0 loops forever.
    fn loop_count(&self) -> u32;
    /// Per-frame durations in milliseconds, as stored in the file.
    fn frame_durations_ms(&self) -> Vec<u32>;
    /// Placement metadata for `frame`.
    fn frame_info(&self, frame: usize) -> AnimResult<FrameInfo>;
    /// Pixel producer for `frame`.
    fn frame(&self, frame: usize) -> AnimResult<Box<dyn AnimatedFrame + '_>>;
    /// Return `true` when frames render at arbitrary sizes natively.
    fn supports_scaling(&self) -> bool;
    /// Bytes retained by the decoded data.
    fn size_in_bytes(&self) -> usize;
    /// Release decoder resources. Called exactly once, when the last [`ImageHandle`] drops.
    fn dispose(&self) {}
}

/// Owning wrapper around a decoder frame whose `dispose` is idempotent.
pub struct FrameHandle<'a> {
    frame: Option<Box<dyn AnimatedFrame + 'a>>,
}

impl<'a> FrameHandle<'a> {
    fn new(frame: Box<dyn AnimatedFrame + 'a>) -> Self {
        Self { frame: Some(frame) }
    }

    fn live(&mut self) -> AnimResult<&mut Box<dyn AnimatedFrame + 'a>> {
        self.frame
            .as_mut()
            .ok_or_else(|| AnimError::render("frame already disposed"))
    }

    /// Render the frame, see [`AnimatedFrame::render`].
    pub fn render(&mut self, width: u32, height: u32, target: &mut Bitmap) -> AnimResult<()> {
        self.live()?.render(width, height, target)
    }

    /// Release the frame. Further calls do nothing.
    pub fn dispose(&mut self) {
        if let Some(mut frame) = self.frame.take() {
            frame.dispose();
        }
    }

    /// Return `true` once [`FrameHandle::dispose`] ran.
    pub fn is_disposed(&self) -> bool {
        self.frame.is_none()
    }
}

impl Drop for FrameHandle<'_> {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Replace unspecified (too short) durations with the default.
pub fn normalize_frame_durations(durations: &mut [u32]) {
    for duration in durations.iter_mut() {
        if *duration < MIN_FRAME_DURATION_MS {
            *duration = FRAME_DURATION_MS_FOR_MIN;
        }
    }
}

/// Start time of every frame within one loop.
pub fn frame_timestamps_ms(durations: &[u32]) -> Vec<u64> {
    durations
        .iter()
        .scan(0u64, |acc, d| {
            let start = *acc;
            *acc += u64::from(*d);
            Some(start)
        })
        .collect()
}

struct ImageInner {
    image: Box<dyn AnimatedImage>,
    key: ImageCacheKey,
    durations_ms: Vec<u32>,
    timestamps_ms: Vec<u64>,
    loop_duration_ms: u64,
}

impl Drop for ImageInner {
    fn drop(&mut self) {
        tracing::trace!(image = self.key.0, "disposing decoded image");
        self.image.dispose();
    }
}

/// Shared handle to a decoded image with normalized timing.
///
/// Clones share the decoded data; the decoder's `dispose` runs when the last clone drops.
#[derive(Clone)]
pub struct ImageHandle {
    inner: Arc<ImageInner>,
}

impl fmt::Debug for ImageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageHandle")
            .field("key", &self.inner.key)
            .field("frames", &self.frame_count())
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

impl ImageHandle {
    /// Validate `image` and wrap it.
    pub fn new(image: impl AnimatedImage + 'static, key: ImageCacheKey) -> AnimResult<Self> {
        Self::from_boxed(Box::new(image), key)
    }

    /// Validate a boxed `image` and wrap it.
    pub fn from_boxed(image: Box<dyn AnimatedImage>, key: ImageCacheKey) -> AnimResult<Self> {
        let frame_count = image.frame_count();
        if frame_count == 0 {
            return Err(AnimError::validation("animated image has no frames"));
        }
        if image.width() == 0 || image.height() == 0 {
            return Err(AnimError::validation(format!(
                "animated image canvas must be non-empty, got {}x{}",
                image.width(),
                image.height()
            )));
        }
        let mut durations_ms = image.frame_durations_ms();
        if durations_ms.len() != frame_count {
            return Err(AnimError::validation(format!(
                "expected {frame_count} frame durations, got {}",
                durations_ms.len()
            )));
        }
        normalize_frame_durations(&mut durations_ms);
        let timestamps_ms = frame_timestamps_ms(&durations_ms);
        let loop_duration_ms = durations_ms.iter().map(|d| u64::from(*d)).sum();
        Ok(Self {
            inner: Arc::new(ImageInner {
                image,
                key,
                durations_ms,
                timestamps_ms,
                loop_duration_ms,
            }),
        })
    }

    fn check_frame(&self, frame: usize) -> AnimResult<()> {
        let frame_count = self.frame_count();
        if frame >= frame_count {
            return Err(AnimError::FrameOutOfRange { frame, frame_count });
        }
        Ok(())
    }

    /// Cache key of the image.
    pub fn cache_key(&self) -> ImageCacheKey {
        self.inner.key
    }

    /// Number of frames.
    pub fn frame_count(&self) -> usize {
        self.inner.image.frame_count()
    }

    /// Canvas width.
    pub fn width(&self) -> u32 {
        self.inner.image.width()
    }

    /// Canvas height.
    pub fn height(&self) -> u32 {
        self.inner.image.height()
    }

    /// Canvas size.
    pub fn canvas_size(&self) -> Size {
        Size::new(self.width(), self.height())
    }

    /// Loop count; 0 loops forever.
    pub fn loop_count(&self) -> u32 {
        self.inner.image.loop_count()
    }

    /// Return `true` when the decoder renders frames at arbitrary sizes.
    pub fn supports_scaling(&self) -> bool {
        self.inner.image.supports_scaling()
    }

    /// Bytes retained by the decoded data.
    pub fn size_in_bytes(&self) -> usize {
        self.inner.image.size_in_bytes()
    }

    /// Placement metadata for `frame`.
    pub fn frame_info(&self, frame: usize) -> AnimResult<FrameInfo> {
        self.check_frame(frame)?;
        self.inner.image.frame_info(frame)
    }

    /// Pixel producer for `frame`.
    pub fn frame(&self, frame: usize) -> AnimResult<FrameHandle<'_>> {
        self.check_frame(frame)?;
        Ok(FrameHandle::new(self.inner.image.frame(frame)?))
    }

    /// Normalized duration of `frame`; 0 outside the frame range.
    pub fn frame_duration_ms(&self, frame: usize) -> u32 {
        self.inner.durations_ms.get(frame).copied().unwrap_or(0)
    }

    /// Normalized durations of all frames.
    pub fn frame_durations_ms(&self) -> &[u32] {
        &self.inner.durations_ms
    }

    /// Start of `frame` within one loop; 0 outside the frame range.
    pub fn timestamp_ms(&self, frame: usize) -> u64 {
        self.inner.timestamps_ms.get(frame).copied().unwrap_or(0)
    }

    /// Length of one loop.
    pub fn loop_duration_ms(&self) -> u64 {
        self.inner.loop_duration_ms
    }

    /// Frame showing at `timestamp_ms`, counted from the start of the first loop.
    pub fn frame_for_timestamp_ms(&self, timestamp_ms: u64) -> usize {
        let in_loop = timestamp_ms % self.inner.loop_duration_ms.max(1);
        self.inner
            .timestamps_ms
            .partition_point(|start| *start <= in_loop)
            .saturating_sub(1)
    }

    /// The wrapped decoder.
    pub fn image(&self) -> &dyn AnimatedImage {
        self.inner.image.as_ref()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/source/image.rs"]
mod tests;
