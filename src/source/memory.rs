use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::foundation::core::IntRect;
use crate::foundation::error::{AnimError, AnimResult};
use crate::render::bitmap::Bitmap;
use crate::render::blend::BlendMode;
use crate::source::frame_info::{BlendOperation, DisposalMethod, FrameInfo};
use crate::source::image::{AnimatedFrame, AnimatedImage};

/// One frame of a [`MemoryAnimatedImage`].
#[derive(Clone, Debug)]
pub struct MemoryFrame {
    x_offset: i32,
    y_offset: i32,
    width: i32,
    height: i32,
    duration_ms: u32,
    blend_operation: BlendOperation,
    disposal_method: DisposalMethod,
    pixels: Option<Arc<Bitmap>>,
}

impl MemoryFrame {
    /// Frame at the canvas origin sized to `pixels`.
    pub fn new(pixels: Bitmap) -> Self {
        Self {
            x_offset: 0,
            y_offset: 0,
            width: i32::try_from(pixels.width()).unwrap_or(i32::MAX),
            height: i32::try_from(pixels.height()).unwrap_or(i32::MAX),
            duration_ms: 100,
            blend_operation: BlendOperation::BlendWithPrevious,
            disposal_method: DisposalMethod::DoNotDispose,
            pixels: Some(Arc::new(pixels)),
        }
    }

    /// Frame without pixels and zero extent.
    pub fn invisible() -> Self {
        Self {
            x_offset: 0,
            y_offset: 0,
            width: 0,
            height: 0,
            duration_ms: 100,
            blend_operation: BlendOperation::BlendWithPrevious,
            disposal_method: DisposalMethod::DoNotDispose,
            pixels: None,
        }
    }

    /// Place the frame at `(x, y)` on the canvas.
    pub fn at(mut self, x: i32, y: i32) -> Self {
        self.x_offset = x;
        self.y_offset = y;
        self
    }

    /// Set the blend operation.
    pub fn blend(mut self, blend_operation: BlendOperation) -> Self {
        self.blend_operation = blend_operation;
        self
    }

    /// Set the disposal method.
    pub fn disposal(mut self, disposal_method: DisposalMethod) -> Self {
        self.disposal_method = disposal_method;
        self
    }

    /// Set the stored duration.
    pub fn duration_ms(mut self, duration_ms: u32) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    fn info(&self, frame_number: usize) -> FrameInfo {
        FrameInfo {
            frame_number,
            x_offset: self.x_offset,
            y_offset: self.y_offset,
            width: self.width,
            height: self.height,
            blend_operation: self.blend_operation,
            disposal_method: self.disposal_method,
        }
    }
}

/// Counters observing decoder resource release.
#[derive(Clone, Debug, Default)]
pub struct DisposeCounters {
    image: Arc<AtomicUsize>,
    frames: Arc<AtomicUsize>,
    renders: Arc<AtomicUsize>,
}

impl DisposeCounters {
    /// Times the image was disposed.
    pub fn image_disposals(&self) -> usize {
        self.image.load(Ordering::SeqCst)
    }

    /// Times any frame object was disposed.
    pub fn frame_disposals(&self) -> usize {
        self.frames.load(Ordering::SeqCst)
    }

    /// Frame renders performed.
    pub fn frame_renders(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }
}

/// Animated image whose frames are already decoded in memory.
///
/// Frames are produced by nearest-neighbour scaling of the stored pixels, so the image reports
/// native scaling support unless told otherwise.
#[derive(Clone, Debug)]
pub struct MemoryAnimatedImage {
    width: u32,
    height: u32,
    loop_count: u32,
    supports_scaling: bool,
    frames: Vec<MemoryFrame>,
    failing_frames: Vec<usize>,
    counters: DisposeCounters,
}

impl MemoryAnimatedImage {
    /// Empty image with the given canvas.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            loop_count: 0,
            supports_scaling: true,
            frames: Vec::new(),
            failing_frames: Vec::new(),
            counters: DisposeCounters::default(),
        }
    }

    /// Append a frame.
    pub fn with_frame(mut self, frame: MemoryFrame) -> Self {
        self.frames.push(frame);
        self
    }

    /// Set the loop count; 0 loops forever.
    pub fn with_loop_count(mut self, loop_count: u32) -> Self {
        self.loop_count = loop_count;
        self
    }

    /// Declare whether frames render at arbitrary sizes.
    pub fn with_scaling(mut self, supports_scaling: bool) -> Self {
        self.supports_scaling = supports_scaling;
        self
    }

    /// Make rendering `frame` fail, as a corrupt frame would.
    pub fn with_failing_frame(mut self, frame: usize) -> Self {
        self.failing_frames.push(frame);
        self
    }

    /// Shared release counters.
    pub fn counters(&self) -> DisposeCounters {
        self.counters.clone()
    }

    fn stored(&self, frame: usize) -> AnimResult<&MemoryFrame> {
        self.frames.get(frame).ok_or(AnimError::FrameOutOfRange {
            frame,
            frame_count: self.frames.len(),
        })
    }
}

struct MemoryFrameRef<'a> {
    frame: &'a MemoryFrame,
    fails: bool,
    counters: &'a DisposeCounters,
}

impl AnimatedFrame for MemoryFrameRef<'_> {
    fn width(&self) -> i32 {
        self.frame.width
    }

    fn height(&self) -> i32 {
        self.frame.height
    }

    fn x_offset(&self) -> i32 {
        self.frame.x_offset
    }

    fn y_offset(&self) -> i32 {
        self.frame.y_offset
    }

    fn render(&mut self, width: u32, height: u32, target: &mut Bitmap) -> AnimResult<()> {
        if self.fails {
            return Err(AnimError::decode("frame data is corrupt"));
        }
        let Some(pixels) = &self.frame.pixels else {
            return Err(AnimError::render("invisible frame has no pixels"));
        };
        if !target.fits(width, height) {
            return Err(AnimError::render(format!(
                "target {}x{} smaller than requested {width}x{height}",
                target.width(),
                target.height()
            )));
        }
        let dst = IntRect::from_xywh(
            0,
            0,
            i32::try_from(width).unwrap_or(i32::MAX),
            i32::try_from(height).unwrap_or(i32::MAX),
        );
        target.composite(pixels, pixels.bounds(), dst, BlendMode::Src);
        self.counters.renders.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn dispose(&mut self) {
        self.counters.frames.fetch_add(1, Ordering::SeqCst);
    }
}

impl AnimatedImage for MemoryAnimatedImage {
    fn frame_count(&self) -> usize {
        self.frames.len()
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn loop_count(&self) -> u32 {
        self.loop_count
    }

    fn frame_durations_ms(&self) -> Vec<u32> {
        self.frames.iter().map(|f| f.duration_ms).collect()
    }

    fn frame_info(&self, frame: usize) -> AnimResult<FrameInfo> {
        Ok(self.stored(frame)?.info(frame))
    }

    fn frame(&self, frame: usize) -> AnimResult<Box<dyn AnimatedFrame + '_>> {
        Ok(Box::new(MemoryFrameRef {
            frame: self.stored(frame)?,
            fails: self.failing_frames.contains(&frame),
            counters: &self.counters,
        }))
    }

    fn supports_scaling(&self) -> bool {
        self.supports_scaling
    }

    fn size_in_bytes(&self) -> usize {
        self.frames
            .iter()
            .filter_map(|f| f.pixels.as_ref())
            .map(|p| p.size_in_bytes())
            .sum()
    }

    fn dispose(&self) {
        self.counters.image.fetch_add(1, Ordering::SeqCst);
    }
}
