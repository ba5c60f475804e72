use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::cache::key::{FrameKey, ImageCacheKey};
use crate::pool::counting::{CountingPool, ExclusivityObserver, ObserverRef};
use crate::render::bitmap::{Bitmap, BitmapRef};

/// Pool shared by the frame caches of every animated image.
pub type FramePool = CountingPool<FrameKey, Bitmap>;

/// Frame slots whose buffers nobody outside the pool references.
///
/// Ordered by the time the pool reported them exclusive, oldest first.
struct FreeList {
    keys: Mutex<VecDeque<FrameKey>>,
}

impl ExclusivityObserver<FrameKey> for FreeList {
    fn on_exclusivity_changed(&self, key: &FrameKey, is_exclusive: bool) {
        let mut keys = self.keys.lock();
        if is_exclusive {
            if !keys.contains(key) {
                keys.push_back(*key);
            }
        } else {
            keys.retain(|k| k != key);
        }
    }
}

/// Frame cache scoped to one image on top of the shared [`FramePool`].
pub struct AnimatedFrameCache {
    image: ImageCacheKey,
    pool: FramePool,
    free: Arc<FreeList>,
}

impl AnimatedFrameCache {
    /// Cache frames of `image` in `pool`.
    pub fn new(image: ImageCacheKey, pool: FramePool) -> Self {
        Self {
            image,
            pool,
            free: Arc::new(FreeList {
                keys: Mutex::new(VecDeque::new()),
            }),
        }
    }

    fn key(&self, frame: usize) -> FrameKey {
        FrameKey::new(self.image, frame)
    }

    /// Image this cache is scoped to.
    pub fn image_key(&self) -> ImageCacheKey {
        self.image
    }

    /// Store `bitmap` as frame `frame`, replacing any previous buffer.
    ///
    /// Returns a new ref owned by the caller, or `None` when the pool refused the insert.
    pub fn cache(&self, frame: usize, bitmap: &BitmapRef) -> Option<BitmapRef> {
        let observer: ObserverRef<FrameKey> = self.free.clone();
        self.pool
            .cache(self.key(frame), Arc::clone(bitmap.shared()), Some(observer))
    }

    /// Ref to the cached buffer for `frame`.
    pub fn get(&self, frame: usize) -> Option<BitmapRef> {
        self.pool.get(&self.key(frame))
    }

    /// Return `true` when the pool holds a buffer for `frame`.
    pub fn contains(&self, frame: usize) -> bool {
        self.pool.contains(&self.key(frame))
    }

    /// Claim a free buffer for overwriting.
    ///
    /// A key may have gone non-exclusive or been evicted between its notification and this
    /// call; such keys are skipped until one reuses cleanly or the list runs out.
    pub fn get_for_reuse(&self) -> Option<Bitmap> {
        loop {
            let key = self.pop_oldest_free_key()?;
            if let Some(bitmap) = self.pool.reuse(&key) {
                return Some(bitmap);
            }
            tracing::trace!(frame = key.frame_index, "free frame slot raced away");
        }
    }

    fn pop_oldest_free_key(&self) -> Option<FrameKey> {
        self.free.keys.lock().pop_front()
    }

    /// Number of frame slots currently eligible for reuse.
    pub fn free_count(&self) -> usize {
        self.free.keys.lock().len()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/cache/frame_cache.rs"]
mod tests;
