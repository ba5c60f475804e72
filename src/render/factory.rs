use crate::foundation::error::{AnimError, AnimResult};
use crate::render::bitmap::Bitmap;

/// Allocates pixel buffers for the CREATED stage and for background preparation.
pub trait BitmapFactory: Send + Sync {
    /// Allocate a fully transparent `width x height` bitmap.
    fn create_bitmap(&self, width: u32, height: u32) -> AnimResult<Bitmap>;
}

/// Heap allocator with an optional per-bitmap byte cap.
#[derive(Clone, Copy, Debug)]
pub struct HeapBitmapFactory {
    max_bitmap_bytes: usize,
}

impl HeapBitmapFactory {
    /// Allocator without a cap beyond what the heap can satisfy.
    pub fn new() -> Self {
        Self {
            max_bitmap_bytes: usize::MAX,
        }
    }

    /// Allocator that refuses bitmaps larger than `max_bitmap_bytes`.
    pub fn with_max_bitmap_bytes(max_bitmap_bytes: usize) -> Self {
        Self { max_bitmap_bytes }
    }
}

impl Default for HeapBitmapFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl BitmapFactory for HeapBitmapFactory {
    fn create_bitmap(&self, width: u32, height: u32) -> AnimResult<Bitmap> {
        let bytes = (width as usize)
            .saturating_mul(height as usize)
            .saturating_mul(4);
        if bytes > self.max_bitmap_bytes {
            return Err(AnimError::allocation(format!(
                "{width}x{height} bitmap needs {bytes} bytes, cap is {}",
                self.max_bitmap_bytes
            )));
        }
        Bitmap::new(width, height)
    }
}
