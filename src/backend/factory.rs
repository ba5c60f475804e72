use std::sync::Arc;
use std::time::Duration;

use crate::backend::bitmap_backend::BitmapAnimationBackend;
use crate::backend::opts::AnimationOpts;
use crate::backend::renderer::CompositingFrameRenderer;
use crate::cache::bitmap_cache::create_frame_cache;
use crate::cache::frame_cache::FramePool;
use crate::composite::decode::decode_animated_image;
use crate::foundation::error::AnimResult;
use crate::prepare::executor::{FrameExecutor, SerialExecutor};
use crate::prepare::preparer::{DefaultFramePreparer, FramePreparer};
use crate::prepare::strategy::FixedNumberPreparationStrategy;
use crate::render::factory::BitmapFactory;
use crate::source::image::ImageHandle;

/// Builds [`BitmapAnimationBackend`]s sharing one frame pool and one preparation worker.
pub struct AnimationBackendFactory {
    pool: FramePool,
    bitmap_factory: Arc<dyn BitmapFactory>,
    preparer: Option<Arc<dyn FramePreparer>>,
    opts: AnimationOpts,
}

impl AnimationBackendFactory {
    /// Factory without background preparation.
    pub fn new(pool: FramePool, bitmap_factory: Arc<dyn BitmapFactory>, opts: AnimationOpts) -> Self {
        Self {
            pool,
            bitmap_factory,
            preparer: None,
            opts,
        }
    }

    /// Prepare frames on `executor`.
    pub fn with_executor(mut self, executor: Arc<dyn FrameExecutor>) -> Self {
        self.preparer = Some(Arc::new(DefaultFramePreparer::new(
            self.bitmap_factory.clone(),
            executor,
        )));
        self
    }

    /// Prepare frames on a dedicated worker thread sized by the options.
    pub fn with_serial_executor(self) -> AnimResult<Self> {
        let executor = SerialExecutor::new(self.opts.prepare_queue_capacity)?;
        Ok(self.with_executor(Arc::new(executor)))
    }

    /// Options backends are built with.
    pub fn opts(&self) -> &AnimationOpts {
        &self.opts
    }

    /// Pool shared by every backend of this factory.
    pub fn pool(&self) -> &FramePool {
        &self.pool
    }

    /// Decode what the options ask for and assemble a backend for `image`.
    pub fn create_backend(&self, image: ImageHandle) -> AnimResult<BitmapAnimationBackend> {
        self.opts.validate()?;
        let result = Arc::new(decode_animated_image(
            image.clone(),
            &self.opts.decode,
            self.bitmap_factory.as_ref(),
        )?);
        let cache = create_frame_cache(self.opts.caching_strategy, image.cache_key(), &self.pool);
        let renderer = Arc::new(CompositingFrameRenderer::new(result, cache.clone()));

        let mut backend =
            BitmapAnimationBackend::new(image, self.bitmap_factory.clone(), cache, renderer)
                .with_event_queue_capacity(self.opts.event_queue_capacity)
                .with_inactivity_timeout(Duration::from_millis(self.opts.inactivity_timeout_ms))
                .with_loop_count_override(self.opts.loop_count_override);
        if let Some(preparer) = &self.preparer {
            if self.opts.frames_to_prefetch == 0 {
                tracing::trace!(backend = backend.id(), "prefetch disabled");
            } else if !backend.cache().keeps_prepared_frames() {
                tracing::debug!(
                    backend = backend.id(),
                    strategy = ?self.opts.caching_strategy,
                    "caching strategy keeps no prepared frames, prefetch disabled"
                );
            } else {
                backend = backend.with_preparation(
                    Box::new(FixedNumberPreparationStrategy::new(self.opts.frames_to_prefetch)),
                    preparer.clone(),
                );
            }
        }
        tracing::debug!(
            backend = backend.id(),
            strategy = ?self.opts.caching_strategy,
            frames = backend.frame_count(),
            "animation backend created"
        );
        Ok(backend)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/backend/factory.rs"]
mod tests;
