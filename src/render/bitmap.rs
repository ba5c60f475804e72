use std::fmt;

use crate::foundation::core::{IntRect, Rgba8Premul, Size, clamp_to_i32};
use crate::foundation::error::{AnimError, AnimResult};
use crate::pool::counting::PoolValue;
use crate::pool::reference::PooledRef;
use crate::render::blend::{BlendMode, blend_px, premultiply, unpremultiply};

/// Shared, reference-counted handle to an immutable [`Bitmap`].
pub type BitmapRef = PooledRef<Bitmap>;

/// Owned premultiplied RGBA8 pixel buffer (row-major, tightly packed).
#[derive(Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bitmap")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .finish()
    }
}

fn byte_len(width: u32, height: u32) -> AnimResult<usize> {
    if width == 0 || height == 0 {
        return Err(AnimError::validation(format!(
            "bitmap dimensions must be non-zero, got {width}x{height}"
        )));
    }
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|px| px.checked_mul(4))
        .ok_or_else(|| AnimError::allocation(format!("bitmap {width}x{height} overflows usize")))
}

impl Bitmap {
    /// Allocate a fully transparent bitmap.
    ///
    /// Allocation failure is reported as [`AnimError::Allocation`] instead of aborting.
    pub fn new(width: u32, height: u32) -> AnimResult<Self> {
        let len = byte_len(width, height)?;
        let mut data = Vec::new();
        data.try_reserve_exact(len).map_err(|e| {
            AnimError::allocation(format!("cannot allocate {width}x{height} bitmap: {e}"))
        })?;
        data.resize(len, 0);
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Wrap existing premultiplied RGBA8 bytes.
    pub fn from_premul_rgba8(width: u32, height: u32, data: Vec<u8>) -> AnimResult<Self> {
        let len = byte_len(width, height)?;
        if data.len() != len {
            return Err(AnimError::validation(format!(
                "bitmap {width}x{height} expects {len} bytes, got {}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Allocate a bitmap filled with one color.
    pub fn solid(width: u32, height: u32, color: Rgba8Premul) -> AnimResult<Self> {
        let mut out = Self::new(width, height)?;
        out.fill_rect(out.bounds(), color);
        Ok(out)
    }

    /// Convert a straight-alpha image into a premultiplied bitmap.
    pub fn from_rgba_image(img: &image::RgbaImage) -> AnimResult<Self> {
        let data = img
            .pixels()
            .flat_map(|p| premultiply(p.0))
            .collect::<Vec<u8>>();
        Self::from_premul_rgba8(img.width(), img.height(), data)
    }

    /// Convert into a straight-alpha image, e.g. for writing PNG snapshots.
    pub fn to_rgba_image(&self) -> AnimResult<image::RgbaImage> {
        let data = self
            .data
            .chunks_exact(4)
            .flat_map(|px| unpremultiply([px[0], px[1], px[2], px[3]]))
            .collect::<Vec<u8>>();
        image::RgbaImage::from_raw(self.width, self.height, data)
            .ok_or_else(|| AnimError::validation("bitmap byte length does not match dimensions"))
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Dimensions.
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Rectangle covering the whole bitmap.
    pub fn bounds(&self) -> IntRect {
        IntRect::from_size(self.size())
    }

    /// Raw premultiplied RGBA8 bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable raw premultiplied RGBA8 bytes.
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Bytes held by the pixel store.
    pub fn size_in_bytes(&self) -> usize {
        self.data.len()
    }

    /// Return `true` when this bitmap is at least `width x height`.
    pub fn fits(&self, width: u32, height: u32) -> bool {
        self.width >= width && self.height >= height
    }

    fn offset(&self, x: i32, y: i32) -> usize {
        ((y as usize) * (self.width as usize) + (x as usize)) * 4
    }

    /// Pixel at `(x, y)`, or `None` outside the bitmap.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba8Premul> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = self.offset(clamp_to_i32(x), clamp_to_i32(y));
        Some(Rgba8Premul::from_array([
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ]))
    }

    /// Set every pixel to fully transparent.
    pub fn erase(&mut self) {
        self.data.fill(0);
    }

    /// Set the pixels of `rect` (clipped to the bitmap) to fully transparent.
    pub fn clear_rect(&mut self, rect: IntRect) {
        self.fill_rect(rect, Rgba8Premul::transparent());
    }

    /// Replace the pixels of `rect` (clipped to the bitmap) with `color`.
    pub fn fill_rect(&mut self, rect: IntRect, color: Rgba8Premul) {
        let Some(rect) = rect.intersect(self.bounds()) else {
            return;
        };
        let px = color.to_array();
        for y in rect.top..rect.bottom {
            let start = self.offset(rect.left, y);
            let end = self.offset(rect.right, y);
            for chunk in self.data[start..end].chunks_exact_mut(4) {
                chunk.copy_from_slice(&px);
            }
        }
    }

    /// Draw `src_rect` of `src` into `dst_rect` of `self`.
    ///
    /// Nearest-neighbour scaling applies when the rectangles differ in size. `src_rect` is
    /// clipped to `src`; destination pixels outside `self` are dropped.
    pub fn composite(&mut self, src: &Bitmap, src_rect: IntRect, dst_rect: IntRect, mode: BlendMode) {
        let Some(src_rect) = src_rect.intersect(src.bounds()) else {
            return;
        };
        if dst_rect.is_empty() {
            return;
        }
        let Some(visible) = dst_rect.intersect(self.bounds()) else {
            return;
        };
        let (sw, sh) = (i64::from(src_rect.width()), i64::from(src_rect.height()));
        let (dw, dh) = (i64::from(dst_rect.width()), i64::from(dst_rect.height()));

        for dy in visible.top..visible.bottom {
            let sy = src_rect.top + ((i64::from(dy - dst_rect.top) * sh) / dh) as i32;
            for dx in visible.left..visible.right {
                let sx = src_rect.left + ((i64::from(dx - dst_rect.left) * sw) / dw) as i32;
                let si = src.offset(sx, sy);
                let di = self.offset(dx, dy);
                blend_px(&mut self.data[di..di + 4], &src.data[si..si + 4], mode);
            }
        }
    }
}

impl PoolValue for Bitmap {
    fn size_in_bytes(&self) -> usize {
        self.data.len()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/bitmap.rs"]
mod tests;
