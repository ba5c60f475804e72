use std::collections::HashMap;

use parking_lot::Mutex;

use crate::cache::bitmap_cache::{BitmapFrameCache, FrameType};
use crate::cache::frame_cache::AnimatedFrameCache;
use crate::render::bitmap::{Bitmap, BitmapRef};

#[derive(Default)]
struct PooledState {
    last_rendered: Option<(usize, BitmapRef)>,
    // Prepared frames stay leased until drawn so the pool cannot recycle them first.
    prepared_pending: HashMap<usize, BitmapRef>,
}

/// Caches every frame in the shared pool, optionally recycling free buffers.
pub struct PooledFrameCache {
    frames: AnimatedFrameCache,
    enable_reuse: bool,
    state: Mutex<PooledState>,
}

impl PooledFrameCache {
    /// Wrap `frames`; `enable_reuse` controls whether free buffers are handed out.
    pub fn new(frames: AnimatedFrameCache, enable_reuse: bool) -> Self {
        Self {
            frames,
            enable_reuse,
            state: Mutex::new(PooledState::default()),
        }
    }

    /// Underlying per-image frame cache.
    pub fn frames(&self) -> &AnimatedFrameCache {
        &self.frames
    }

    /// Number of prepared frames not drawn yet.
    pub fn pending_count(&self) -> usize {
        self.state.lock().prepared_pending.len()
    }
}

impl BitmapFrameCache for PooledFrameCache {
    fn cached_frame(&self, frame: usize) -> Option<BitmapRef> {
        self.frames.get(frame)
    }

    fn fallback_frame(&self, _frame: usize) -> Option<BitmapRef> {
        self.state
            .lock()
            .last_rendered
            .as_ref()
            .map(|(_, bitmap)| bitmap.clone())
    }

    fn bitmap_to_reuse_for_frame(&self, frame: usize, width: u32, height: u32) -> Option<Bitmap> {
        if !self.enable_reuse {
            return None;
        }
        let bitmap = self.frames.get_for_reuse()?;
        if !bitmap.fits(width, height) {
            tracing::debug!(
                frame,
                have_w = bitmap.width(),
                have_h = bitmap.height(),
                want_w = width,
                want_h = height,
                "discarding undersized reuse buffer"
            );
            return None;
        }
        Some(bitmap)
    }

    fn contains(&self, frame: usize) -> bool {
        self.frames.contains(frame)
    }

    fn size_in_bytes(&self) -> usize {
        let state = self.state.lock();
        let last = state
            .last_rendered
            .as_ref()
            .map_or(0, |(_, bitmap)| bitmap.size_in_bytes());
        let pending = state
            .prepared_pending
            .values()
            .map(|bitmap| bitmap.size_in_bytes())
            .sum::<usize>();
        last + pending
    }

    fn clear(&self) {
        let dropped = {
            let mut state = self.state.lock();
            std::mem::take(&mut *state)
        };
        // Refs go back to the pool outside our lock.
        drop(dropped);
    }

    fn on_frame_rendered(&self, frame: usize, bitmap: &BitmapRef, frame_type: FrameType) {
        let stored = if frame_type == FrameType::Cached && bitmap.is_leased() {
            Some(bitmap.clone())
        } else {
            self.frames.cache(frame, bitmap)
        };
        let previous = {
            let mut state = self.state.lock();
            let pending = state.prepared_pending.remove(&frame);
            let last = match stored {
                Some(stored) => state.last_rendered.replace((frame, stored)),
                None => None,
            };
            (pending, last)
        };
        drop(previous);
    }

    fn on_frame_prepared(&self, frame: usize, bitmap: &BitmapRef, _frame_type: FrameType) {
        let Some(stored) = self.frames.cache(frame, bitmap) else {
            tracing::debug!(frame, "pool refused prepared frame");
            return;
        };
        let previous = self.state.lock().prepared_pending.insert(frame, stored);
        drop(previous);
    }
}
