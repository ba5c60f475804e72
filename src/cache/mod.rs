/// Caching policy trait, frame types and the policy factory.
pub mod bitmap_cache;
/// Per-image frame cache and free list.
pub mod frame_cache;
/// Keep-last-frame policy.
pub mod keep_last;
/// Image and frame cache keys.
pub mod key;
/// Policy that caches nothing.
pub mod no_op;
/// Shared-pool policy with optional buffer reuse.
pub mod pooled;

#[cfg(test)]
#[path = "../../tests/unit/cache/strategies.rs"]
mod strategy_tests;
