use parking_lot::Mutex;

use crate::cache::bitmap_cache::{BitmapFrameCache, FrameType};
use crate::render::bitmap::{Bitmap, BitmapRef};

/// Retains only the most recently rendered frame.
#[derive(Default)]
pub struct KeepLastFrameCache {
    last: Mutex<Option<(usize, BitmapRef)>>,
}

impl KeepLastFrameCache {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }
}

impl BitmapFrameCache for KeepLastFrameCache {
    fn cached_frame(&self, frame: usize) -> Option<BitmapRef> {
        match &*self.last.lock() {
            Some((last, bitmap)) if *last == frame => Some(bitmap.clone()),
            _ => None,
        }
    }

    fn fallback_frame(&self, _frame: usize) -> Option<BitmapRef> {
        self.last.lock().as_ref().map(|(_, bitmap)| bitmap.clone())
    }

    fn bitmap_to_reuse_for_frame(&self, _frame: usize, width: u32, height: u32) -> Option<Bitmap> {
        let (_, bitmap) = self.last.lock().take()?;
        // Only a buffer nobody else is drawing from may be overwritten.
        let bitmap = bitmap.try_unwrap().ok()?;
        bitmap.fits(width, height).then_some(bitmap)
    }

    fn contains(&self, frame: usize) -> bool {
        matches!(&*self.last.lock(), Some((last, _)) if *last == frame)
    }

    fn size_in_bytes(&self) -> usize {
        self.last
            .lock()
            .as_ref()
            .map_or(0, |(_, bitmap)| bitmap.size_in_bytes())
    }

    fn clear(&self) {
        let dropped = self.last.lock().take();
        drop(dropped);
    }

    fn on_frame_rendered(&self, frame: usize, bitmap: &BitmapRef, _frame_type: FrameType) {
        let previous = self.last.lock().replace((frame, bitmap.clone()));
        drop(previous);
    }

    fn on_frame_prepared(&self, _frame: usize, _bitmap: &BitmapRef, _frame_type: FrameType) {}

    fn keeps_prepared_frames(&self) -> bool {
        false
    }
}
