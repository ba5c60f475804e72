use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::cache::frame_cache::{AnimatedFrameCache, FramePool};
use crate::cache::keep_last::KeepLastFrameCache;
use crate::cache::key::ImageCacheKey;
use crate::cache::no_op::NoOpCache;
use crate::cache::pooled::PooledFrameCache;
use crate::render::bitmap::{Bitmap, BitmapRef};

/// Which stage of the draw chain produced a frame's pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameType {
    /// Served from the frame cache.
    Cached,
    /// Rendered into a recycled buffer.
    Reused,
    /// Rendered into a freshly allocated buffer.
    Created,
    /// A stale frame drawn in place of the requested one.
    Fallback,
    /// No stage produced pixels.
    Unknown,
}

/// Caching policy for the frames of one animation.
///
/// Shared between the render thread and the preparation worker, so every method takes `&self`.
pub trait BitmapFrameCache: Send + Sync {
    /// Cached pixels for `frame`.
    fn cached_frame(&self, frame: usize) -> Option<BitmapRef>;

    /// Any earlier frame that may stand in for `frame`.
    fn fallback_frame(&self, frame: usize) -> Option<BitmapRef>;

    /// A buffer of at least `width x height` that may be overwritten with `frame`.
    fn bitmap_to_reuse_for_frame(&self, frame: usize, width: u32, height: u32) -> Option<Bitmap>;

    /// Return `true` when `frame` is cached.
    fn contains(&self, frame: usize) -> bool;

    /// Bytes held by this cache outside the shared pool's free slots.
    fn size_in_bytes(&self) -> usize;

    /// Release every frame this cache holds.
    fn clear(&self);

    /// `bitmap` was drawn for `frame`. Never called for [`FrameType::Fallback`].
    fn on_frame_rendered(&self, frame: usize, bitmap: &BitmapRef, frame_type: FrameType);

    /// `bitmap` was prepared ahead of time for `frame`.
    fn on_frame_prepared(&self, frame: usize, bitmap: &BitmapRef, frame_type: FrameType);

    /// Return `true` when frames handed to [`Self::on_frame_prepared`] can later be served.
    ///
    /// Background preparation is only wired to caches that keep what it renders.
    fn keeps_prepared_frames(&self) -> bool {
        true
    }
}

/// Caching policies selectable at backend construction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CachingStrategy {
    /// Keep nothing; every draw renders into a fresh buffer.
    NoCache,
    /// Cache every frame in the shared pool and recycle free buffers.
    #[default]
    Pooled,
    /// Cache every frame in the shared pool, never recycle buffers.
    PooledNoReuse,
    /// Keep only the most recently rendered frame.
    KeepLast,
}

impl CachingStrategy {
    /// Map a numeric code (`0` none, `1` pooled, `2` pooled without reuse, `3` keep last).
    ///
    /// Unknown codes select [`CachingStrategy::NoCache`].
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Self::NoCache,
            1 => Self::Pooled,
            2 => Self::PooledNoReuse,
            3 => Self::KeepLast,
            other => {
                tracing::warn!(code = other, "unknown caching strategy code, caching disabled");
                Self::NoCache
            }
        }
    }
}

/// Build the frame cache for `image` under `strategy`.
pub fn create_frame_cache(
    strategy: CachingStrategy,
    image: ImageCacheKey,
    pool: &FramePool,
) -> Arc<dyn BitmapFrameCache> {
    match strategy {
        CachingStrategy::NoCache => Arc::new(NoOpCache),
        CachingStrategy::Pooled => Arc::new(PooledFrameCache::new(
            AnimatedFrameCache::new(image, pool.clone()),
            true,
        )),
        CachingStrategy::PooledNoReuse => Arc::new(PooledFrameCache::new(
            AnimatedFrameCache::new(image, pool.clone()),
            false,
        )),
        CachingStrategy::KeepLast => Arc::new(KeepLastFrameCache::new()),
    }
}
