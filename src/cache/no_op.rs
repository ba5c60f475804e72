use crate::cache::bitmap_cache::{BitmapFrameCache, FrameType};
use crate::render::bitmap::{Bitmap, BitmapRef};

/// Caches nothing. Every draw takes the CREATED stage.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpCache;

impl BitmapFrameCache for NoOpCache {
    fn cached_frame(&self, _frame: usize) -> Option<BitmapRef> {
        None
    }

    fn fallback_frame(&self, _frame: usize) -> Option<BitmapRef> {
        None
    }

    fn bitmap_to_reuse_for_frame(&self, _frame: usize, _width: u32, _height: u32) -> Option<Bitmap> {
        None
    }

    fn contains(&self, _frame: usize) -> bool {
        false
    }

    fn size_in_bytes(&self) -> usize {
        0
    }

    fn clear(&self) {}

    fn on_frame_rendered(&self, _frame: usize, _bitmap: &BitmapRef, _frame_type: FrameType) {}

    fn on_frame_prepared(&self, _frame: usize, _bitmap: &BitmapRef, _frame_type: FrameType) {}

    fn keeps_prepared_frames(&self) -> bool {
        false
    }
}
