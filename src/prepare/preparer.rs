use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::backend::renderer::FrameRenderer;
use crate::cache::bitmap_cache::{BitmapFrameCache, FrameType};
use crate::foundation::error::{AnimError, AnimResult};
use crate::prepare::dispatch::{EventSender, PreparerEvent};
use crate::prepare::executor::FrameExecutor;
use crate::render::bitmap::BitmapRef;
use crate::render::factory::BitmapFactory;

/// Everything a preparation job needs to know about the backend it works for.
#[derive(Clone)]
pub struct PrepareContext {
    /// Backend identity, used to de-duplicate jobs.
    pub backend_id: u64,
    /// Frames in the animation.
    pub frame_count: usize,
    /// Bitmap width frames are rendered at.
    pub width: u32,
    /// Bitmap height frames are rendered at.
    pub height: u32,
    /// The backend's caching policy.
    pub cache: Arc<dyn BitmapFrameCache>,
    /// The backend's frame renderer.
    pub renderer: Arc<dyn FrameRenderer>,
    /// Where job outcomes are posted.
    pub events: EventSender,
}

/// Outcome of asking for a frame to be prepared.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrepareRequest {
    /// A job was queued; an event follows when it finishes.
    Scheduled,
    /// A job for this frame is already queued; its event will follow.
    AlreadyPending,
    /// The frame is cached; nothing to do.
    AlreadyCached,
    /// The execution context is saturated.
    Rejected,
}

impl PrepareRequest {
    /// Return `true` unless the request was refused.
    pub fn is_accepted(self) -> bool {
        self != Self::Rejected
    }

    /// Return `true` when a [`PreparerEvent`] will be posted for the frame.
    pub fn will_report(self) -> bool {
        matches!(self, Self::Scheduled | Self::AlreadyPending)
    }
}

/// Renders frames off the render thread.
pub trait FramePreparer: Send + Sync {
    /// Ask for `frame` to be rendered and handed to the context's cache.
    fn prepare_frame(&self, ctx: &PrepareContext, frame: usize) -> PrepareRequest;
}

type PendingSet = Arc<Mutex<HashSet<(u64, usize)>>>;

struct PendingGuard {
    pending: PendingSet,
    id: (u64, usize),
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.pending.lock().remove(&self.id);
    }
}

/// Preparer that renders into a reused buffer when the cache offers one, a fresh one otherwise.
pub struct DefaultFramePreparer {
    factory: Arc<dyn BitmapFactory>,
    executor: Arc<dyn FrameExecutor>,
    pending: PendingSet,
}

impl DefaultFramePreparer {
    /// Preparer allocating through `factory` and running on `executor`.
    pub fn new(factory: Arc<dyn BitmapFactory>, executor: Arc<dyn FrameExecutor>) -> Self {
        Self {
            factory,
            executor,
            pending: Arc::default(),
        }
    }

    /// Jobs queued or running.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}

impl FramePreparer for DefaultFramePreparer {
    fn prepare_frame(&self, ctx: &PrepareContext, frame: usize) -> PrepareRequest {
        if ctx.cache.contains(frame) {
            return PrepareRequest::AlreadyCached;
        }
        let id = (ctx.backend_id, frame);
        if !self.pending.lock().insert(id) {
            tracing::trace!(frame, backend = ctx.backend_id, "frame already pending");
            return PrepareRequest::AlreadyPending;
        }

        let guard = PendingGuard {
            pending: self.pending.clone(),
            id,
        };
        let ctx = ctx.clone();
        let factory = self.factory.clone();
        let accepted = self.executor.try_execute(Box::new(move || {
            let _guard = guard;
            run_job(&ctx, factory.as_ref(), frame);
        }));
        // A refused job is dropped along with its guard, which clears the pending entry.
        if accepted {
            PrepareRequest::Scheduled
        } else {
            tracing::trace!(frame, backend = id.0, "preparation refused");
            PrepareRequest::Rejected
        }
    }
}

fn run_job(ctx: &PrepareContext, factory: &dyn BitmapFactory, frame: usize) {
    let event = if ctx.cache.contains(frame) {
        tracing::trace!(frame, backend = ctx.backend_id, "frame cached before job ran");
        PreparerEvent::FramePrepared {
            backend_id: ctx.backend_id,
            frame,
            frame_type: FrameType::Cached,
        }
    } else {
        match render_ahead(ctx, factory, frame) {
            Ok(frame_type) => {
                tracing::trace!(frame, backend = ctx.backend_id, ?frame_type, "frame prepared");
                PreparerEvent::FramePrepared {
                    backend_id: ctx.backend_id,
                    frame,
                    frame_type,
                }
            }
            Err(error) => {
                tracing::warn!(frame, backend = ctx.backend_id, %error, "frame preparation failed");
                PreparerEvent::PreparationFailed {
                    backend_id: ctx.backend_id,
                    frame,
                    reason: error.to_string(),
                }
            }
        }
    };
    ctx.events.post(event);
}

fn render_ahead(
    ctx: &PrepareContext,
    factory: &dyn BitmapFactory,
    frame: usize,
) -> AnimResult<FrameType> {
    if let Some(mut bitmap) = ctx.cache.bitmap_to_reuse_for_frame(frame, ctx.width, ctx.height) {
        if ctx.renderer.render_frame(frame, &mut bitmap) {
            ctx.cache
                .on_frame_prepared(frame, &BitmapRef::new(bitmap), FrameType::Reused);
            return Ok(FrameType::Reused);
        }
        tracing::debug!(frame, "render into reused buffer failed");
    }

    let mut bitmap = factory.create_bitmap(ctx.width, ctx.height)?;
    if !ctx.renderer.render_frame(frame, &mut bitmap) {
        return Err(AnimError::render(format!("frame {frame} did not render")));
    }
    ctx.cache
        .on_frame_prepared(frame, &BitmapRef::new(bitmap), FrameType::Created);
    Ok(FrameType::Created)
}

#[cfg(test)]
#[path = "../../tests/unit/prepare/preparer.rs"]
mod tests;
