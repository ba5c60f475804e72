use serde::{Deserialize, Serialize};

use crate::cache::bitmap_cache::CachingStrategy;
use crate::composite::decode::DecodeOpts;
use crate::foundation::error::{AnimError, AnimResult};
use crate::prepare::strategy::DEFAULT_FRAMES_TO_PREPARE;

/// Per-animation configuration for [`crate::backend::factory::AnimationBackendFactory`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnimationOpts {
    /// Frame caching policy.
    pub caching_strategy: CachingStrategy,
    /// Frames prepared ahead of the one drawn; 0 disables preparation.
    pub frames_to_prefetch: usize,
    /// Preparation jobs that may wait behind the running one.
    pub prepare_queue_capacity: usize,
    /// Undelivered preparation events kept per backend.
    pub event_queue_capacity: usize,
    /// Idle time after which cached frames are released.
    pub inactivity_timeout_ms: u64,
    /// Loop count reported instead of the image's own.
    pub loop_count_override: Option<u32>,
    /// Eager decoding.
    pub decode: DecodeOpts,
}

impl Default for AnimationOpts {
    fn default() -> Self {
        Self {
            caching_strategy: CachingStrategy::default(),
            frames_to_prefetch: DEFAULT_FRAMES_TO_PREPARE,
            prepare_queue_capacity: 1,
            event_queue_capacity: 64,
            inactivity_timeout_ms: 2000,
            loop_count_override: None,
            decode: DecodeOpts::default(),
        }
    }
}

impl AnimationOpts {
    /// Parse options from JSON; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> AnimResult<Self> {
        serde_json::from_str(json).map_err(|e| AnimError::serde(format!("animation opts: {e}")))
    }

    /// Check values that would make a backend unusable.
    pub fn validate(&self) -> AnimResult<()> {
        if self.event_queue_capacity == 0 {
            return Err(AnimError::validation("event_queue_capacity must be > 0"));
        }
        if self.prepare_queue_capacity == 0 {
            return Err(AnimError::validation("prepare_queue_capacity must be > 0"));
        }
        Ok(())
    }
}
