//! animframe renders animated images (GIF and friends) frame by frame for display.
//!
//! The crate sits between a decoder and a per-tick scheduler:
//!
//! - A [`CountingPool`] shares frame bitmaps between animations and recycles the ones nobody
//!   looks at anymore.
//! - A [`BitmapFrameCache`] policy decides which frames each animation keeps.
//! - The [`AnimatedImageCompositor`] rebuilds full frames from per-frame pixels, honoring
//!   disposal and blend rules.
//! - The [`BitmapAnimationBackend`] draws a frame per call through a fixed fallback chain and
//!   prepares the following frames on a background worker.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod foundation;

/// Animation backends, renderers and listeners.
pub mod backend;
/// Frame caching policies.
pub mod cache;
/// Frame compositing.
pub mod composite;
/// Reference-counted buffer pool.
pub mod pool;
/// Background frame preparation.
pub mod prepare;
/// Bitmaps, blending and allocation.
pub mod render;
/// Decoder boundary and image sources.
pub mod source;

pub use crate::foundation::core::{IntRect, Rgba8Premul, Size};
pub use crate::foundation::error::{AnimError, AnimResult};

pub use crate::backend::bitmap_backend::BitmapAnimationBackend;
pub use crate::backend::factory::AnimationBackendFactory;
pub use crate::backend::listener::{AnimationListener, FrameListener};
pub use crate::backend::opts::AnimationOpts;
pub use crate::backend::renderer::{CompositingFrameRenderer, FrameRenderer};
pub use crate::cache::bitmap_cache::{
    BitmapFrameCache, CachingStrategy, FrameType, create_frame_cache,
};
pub use crate::cache::frame_cache::{AnimatedFrameCache, FramePool};
pub use crate::cache::key::{FrameKey, ImageCacheKey};
pub use crate::composite::compositor::{AnimatedImageCompositor, CompositorCallback};
pub use crate::composite::decode::{DecodeOpts, decode_animated_image};
pub use crate::composite::drawer::FrameDrawer;
pub use crate::pool::counting::{CountingPool, PoolOpts, PoolStats};
pub use crate::prepare::executor::{FrameExecutor, InlineExecutor, SerialExecutor};
pub use crate::prepare::preparer::{DefaultFramePreparer, FramePreparer};
pub use crate::prepare::strategy::{FixedNumberPreparationStrategy, FramePreparationStrategy};
pub use crate::render::bitmap::{Bitmap, BitmapRef};
pub use crate::render::factory::{BitmapFactory, HeapBitmapFactory};
pub use crate::render::target::DrawTarget;
pub use crate::source::gif::decode_gif;
pub use crate::source::image::{AnimatedFrame, AnimatedImage, ImageHandle};
pub use crate::source::memory::{MemoryAnimatedImage, MemoryFrame};
pub use crate::source::result::AnimatedImageResult;
