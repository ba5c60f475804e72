use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Identifies one decoded image across frame caches sharing a pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ImageCacheKey(pub u64);

impl ImageCacheKey {
    /// Content key derived from the encoded image bytes.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(xxhash_rust::xxh3::xxh3_64(bytes))
    }

    /// Process-unique key for images without stable content identity.
    pub fn unique() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        // High bit keeps generated keys apart from content hashes in practice.
        Self(NEXT.fetch_add(1, Ordering::Relaxed) | (1 << 63))
    }
}

/// Address of one frame of one image in the shared pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameKey {
    /// Owning image.
    pub image: ImageCacheKey,
    /// 0-based frame index.
    pub frame_index: usize,
}

impl FrameKey {
    /// Build a key.
    pub fn new(image: ImageCacheKey, frame_index: usize) -> Self {
        Self { image, frame_index }
    }
}
