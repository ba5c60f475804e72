use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::backend::inactivity::InactivityMonitor;
use crate::backend::listener::{AnimationListener, FrameListener, notify_each};
use crate::backend::renderer::FrameRenderer;
use crate::cache::bitmap_cache::{BitmapFrameCache, FrameType};
use crate::foundation::core::{IntRect, clamp_to_i32};
use crate::prepare::dispatch::{EventQueue, EventSender, PreparerEvent};
use crate::prepare::preparer::{FramePreparer, PrepareContext};
use crate::prepare::strategy::FramePreparationStrategy;
use crate::render::bitmap::{Bitmap, BitmapRef};
use crate::render::factory::BitmapFactory;
use crate::render::target::DrawTarget;
use crate::source::image::ImageHandle;

static NEXT_BACKEND_ID: AtomicU64 = AtomicU64::new(1);

/// Undelivered preparation events kept when nothing else is configured.
pub const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 64;

/// Stage order of the draw chain.
const DRAW_CHAIN: [FrameType; 4] = [
    FrameType::Cached,
    FrameType::Reused,
    FrameType::Created,
    FrameType::Fallback,
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StageOutcome {
    Drawn,
    TryNext,
    Abort,
}

struct Preparation {
    strategy: Box<dyn FramePreparationStrategy>,
    preparer: Arc<dyn FramePreparer>,
}

/// Draws the frames of one animation onto a [`DrawTarget`], one call per display tick.
///
/// Each draw walks a fixed chain of stages: the cached frame, a recycled buffer rendered from
/// scratch, a freshly allocated buffer, and finally any stale frame the cache can offer. The
/// first stage that produces pixels wins. Afterwards the preparation strategy (if configured)
/// schedules the next frames in the background, whether or not the draw succeeded.
pub struct BitmapAnimationBackend {
    id: u64,
    image: ImageHandle,
    factory: Arc<dyn BitmapFactory>,
    cache: Arc<dyn BitmapFrameCache>,
    renderer: Arc<dyn FrameRenderer>,
    preparation: Option<Preparation>,
    bounds: Option<IntRect>,
    bitmap_width: u32,
    bitmap_height: u32,
    frame_listeners: Vec<Box<dyn FrameListener>>,
    animation_listeners: Vec<Box<dyn AnimationListener>>,
    events: EventQueue,
    awaiting_load: Option<HashSet<usize>>,
    inactivity: InactivityMonitor,
    loop_count_override: Option<u32>,
}

impl BitmapAnimationBackend {
    /// Backend drawing `image` through `renderer`, caching under `cache`.
    pub fn new(
        image: ImageHandle,
        factory: Arc<dyn BitmapFactory>,
        cache: Arc<dyn BitmapFrameCache>,
        renderer: Arc<dyn FrameRenderer>,
    ) -> Self {
        let mut backend = Self {
            id: NEXT_BACKEND_ID.fetch_add(1, Ordering::Relaxed),
            image,
            factory,
            cache,
            renderer,
            preparation: None,
            bounds: None,
            bitmap_width: 0,
            bitmap_height: 0,
            frame_listeners: Vec::new(),
            animation_listeners: Vec::new(),
            events: EventQueue::bounded(DEFAULT_EVENT_QUEUE_CAPACITY),
            awaiting_load: None,
            inactivity: InactivityMonitor::default(),
            loop_count_override: None,
        };
        backend.update_bitmap_dimensions();
        backend
    }

    /// Prepare frames in the background with `strategy` and `preparer`.
    pub fn with_preparation(
        mut self,
        strategy: Box<dyn FramePreparationStrategy>,
        preparer: Arc<dyn FramePreparer>,
    ) -> Self {
        self.preparation = Some(Preparation { strategy, preparer });
        self
    }

    /// Add a per-frame listener.
    pub fn with_frame_listener(mut self, listener: Box<dyn FrameListener>) -> Self {
        self.frame_listeners.push(listener);
        self
    }

    /// Add an animation listener.
    pub fn with_animation_listener(mut self, listener: Box<dyn AnimationListener>) -> Self {
        self.animation_listeners.push(listener);
        self
    }

    /// Keep at most `capacity` undelivered preparation events.
    pub fn with_event_queue_capacity(mut self, capacity: usize) -> Self {
        self.events = EventQueue::bounded(capacity);
        self
    }

    /// Release cached frames after `timeout` without draws.
    pub fn with_inactivity_timeout(mut self, timeout: Duration) -> Self {
        self.inactivity = InactivityMonitor::new(timeout);
        self
    }

    /// Report `loop_count` instead of the image's own.
    pub fn with_loop_count_override(mut self, loop_count: Option<u32>) -> Self {
        self.loop_count_override = loop_count;
        self
    }

    /// Process-unique identity.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Image being animated.
    pub fn image(&self) -> &ImageHandle {
        &self.image
    }

    /// Caching policy in use.
    pub fn cache(&self) -> &Arc<dyn BitmapFrameCache> {
        &self.cache
    }

    /// Handle for posting preparation events to this backend.
    pub fn event_sender(&self) -> EventSender {
        self.events.sender()
    }

    /// Draw `frame` onto `target`. Returns `true` when anything was drawn.
    pub fn draw_frame(&mut self, target: &mut dyn DrawTarget, frame: usize) -> bool {
        self.run_pending_events();
        self.inactivity.record_draw(Instant::now());
        notify_each(&mut self.frame_listeners, "on_draw_frame_start", |l| {
            l.on_draw_frame_start(frame)
        });

        let drawn = self.draw_with_fallbacks(target, frame);
        match drawn {
            Some(frame_type) => {
                tracing::trace!(frame, backend = self.id, ?frame_type, "frame drawn");
                notify_each(&mut self.frame_listeners, "on_frame_drawn", |l| {
                    l.on_frame_drawn(frame, frame_type)
                });
            }
            None => {
                tracing::debug!(frame, backend = self.id, "frame dropped");
                notify_each(&mut self.frame_listeners, "on_frame_dropped", |l| {
                    l.on_frame_dropped(frame)
                });
            }
        }

        self.prepare_next_frames(frame);
        drawn.is_some()
    }

    fn draw_with_fallbacks(&self, target: &mut dyn DrawTarget, frame: usize) -> Option<FrameType> {
        let frame_count = self.image.frame_count();
        if frame >= frame_count {
            tracing::debug!(frame, frame_count, backend = self.id, "frame out of range");
            return None;
        }
        for frame_type in DRAW_CHAIN {
            match self.draw_stage(target, frame, frame_type) {
                StageOutcome::Drawn => return Some(frame_type),
                StageOutcome::TryNext => {}
                StageOutcome::Abort => return None,
            }
        }
        None
    }

    fn draw_stage(
        &self,
        target: &mut dyn DrawTarget,
        frame: usize,
        frame_type: FrameType,
    ) -> StageOutcome {
        match frame_type {
            FrameType::Cached => match self.cache.cached_frame(frame) {
                Some(bitmap) => {
                    self.draw_bitmap(target, &bitmap);
                    self.cache.on_frame_rendered(frame, &bitmap, frame_type);
                    StageOutcome::Drawn
                }
                None => StageOutcome::TryNext,
            },
            FrameType::Reused => {
                match self.cache.bitmap_to_reuse_for_frame(
                    frame,
                    self.bitmap_width,
                    self.bitmap_height,
                ) {
                    Some(bitmap) => self.render_and_draw(target, frame, bitmap, frame_type),
                    None => StageOutcome::TryNext,
                }
            }
            FrameType::Created => {
                match self
                    .factory
                    .create_bitmap(self.bitmap_width, self.bitmap_height)
                {
                    Ok(bitmap) => self.render_and_draw(target, frame, bitmap, frame_type),
                    Err(error) => {
                        tracing::warn!(frame, backend = self.id, %error, "bitmap allocation failed");
                        StageOutcome::Abort
                    }
                }
            }
            // Stale pixels are drawn but never handed to the cache as this frame.
            FrameType::Fallback => match self.cache.fallback_frame(frame) {
                Some(bitmap) => {
                    self.draw_bitmap(target, &bitmap);
                    StageOutcome::Drawn
                }
                None => StageOutcome::Abort,
            },
            FrameType::Unknown => StageOutcome::Abort,
        }
    }

    fn render_and_draw(
        &self,
        target: &mut dyn DrawTarget,
        frame: usize,
        mut bitmap: Bitmap,
        frame_type: FrameType,
    ) -> StageOutcome {
        if !self.renderer.render_frame(frame, &mut bitmap) {
            tracing::debug!(frame, backend = self.id, ?frame_type, "render failed, trying next stage");
            return StageOutcome::TryNext;
        }
        let bitmap = BitmapRef::new(bitmap);
        self.draw_bitmap(target, &bitmap);
        self.cache.on_frame_rendered(frame, &bitmap, frame_type);
        StageOutcome::Drawn
    }

    fn draw_bitmap(&self, target: &mut dyn DrawTarget, bitmap: &Bitmap) {
        // Recycled buffers can be larger than the frame; only the frame's area is drawn.
        let src = IntRect::from_xywh(
            0,
            0,
            clamp_to_i32(bitmap.width().min(self.bitmap_width)),
            clamp_to_i32(bitmap.height().min(self.bitmap_height)),
        );
        let dst = match self.bounds {
            Some(bounds) if !bounds.is_empty() => bounds,
            _ => src,
        };
        target.draw(bitmap, src, dst);
    }

    fn prepare_context(&self) -> PrepareContext {
        PrepareContext {
            backend_id: self.id,
            frame_count: self.image.frame_count(),
            width: self.bitmap_width,
            height: self.bitmap_height,
            cache: self.cache.clone(),
            renderer: self.renderer.clone(),
            events: self.events.sender(),
        }
    }

    fn prepare_next_frames(&self, frame: usize) {
        if let Some(preparation) = &self.preparation {
            let ctx = self.prepare_context();
            preparation
                .strategy
                .prepare_frames(preparation.preparer.as_ref(), &ctx, frame);
        }
    }

    /// Start preparing the first frames; animation listeners hear about it once they are ready.
    pub fn preload_animation(&mut self) {
        let awaited = match &self.preparation {
            Some(preparation) => {
                let ctx = self.prepare_context();
                preparation
                    .strategy
                    .preload_frames(preparation.preparer.as_ref(), &ctx)
            }
            None => Default::default(),
        };
        if awaited.is_empty() {
            self.notify_loaded();
        } else {
            self.awaiting_load = Some(awaited.into_iter().collect());
            self.run_pending_events();
        }
    }

    fn notify_loaded(&mut self) {
        tracing::debug!(backend = self.id, "animation loaded");
        notify_each(&mut self.animation_listeners, "on_animation_loaded", |l| {
            l.on_animation_loaded()
        });
    }

    /// Deliver queued preparation events to listeners. Returns the number of events handled.
    ///
    /// Frames whose events were dropped on a full queue reach no frame listener but still count
    /// towards preload completion.
    pub fn run_pending_events(&mut self) -> usize {
        let events = self.events.drain();
        let handled = events.len();
        for event in events {
            if event.backend_id() != self.id {
                tracing::debug!(backend = self.id, from = event.backend_id(), "ignoring foreign event");
                continue;
            }
            let frame = event.frame();
            match event {
                PreparerEvent::FramePrepared { frame_type, .. } => {
                    notify_each(&mut self.frame_listeners, "on_frame_prepared", |l| {
                        l.on_frame_prepared(frame, frame_type)
                    });
                }
                PreparerEvent::PreparationFailed { .. } => {
                    notify_each(&mut self.frame_listeners, "on_preparation_failed", |l| {
                        l.on_preparation_failed(frame)
                    });
                }
            }
            self.settle_awaited(frame);
        }
        // Jobs whose events did not fit still finished.
        for frame in self.events.take_dropped() {
            self.settle_awaited(frame);
        }
        handled
    }

    fn settle_awaited(&mut self, frame: usize) {
        let loaded = self.awaiting_load.as_mut().is_some_and(|awaited| {
            awaited.remove(&frame);
            awaited.is_empty()
        });
        if loaded {
            self.awaiting_load = None;
            self.notify_loaded();
        }
    }

    /// Number of frames.
    pub fn frame_count(&self) -> usize {
        self.image.frame_count()
    }

    /// Normalized duration of `frame`.
    pub fn frame_duration_ms(&self, frame: usize) -> u32 {
        self.image.frame_duration_ms(frame)
    }

    /// Loop count, 0 for endless.
    pub fn loop_count(&self) -> u32 {
        self.loop_count_override
            .unwrap_or_else(|| self.image.loop_count())
    }

    /// Duration of one loop.
    pub fn loop_duration_ms(&self) -> u64 {
        self.image.loop_duration_ms()
    }

    /// Image canvas width.
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Image canvas height.
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Width of the bitmaps frames are rendered into.
    pub fn intrinsic_width(&self) -> u32 {
        self.bitmap_width
    }

    /// Height of the bitmaps frames are rendered into.
    pub fn intrinsic_height(&self) -> u32 {
        self.bitmap_height
    }

    /// Bounds frames are drawn into.
    pub fn bounds(&self) -> Option<IntRect> {
        self.bounds
    }

    /// Fit drawing to `bounds`; `None` draws at the rendered size.
    pub fn set_bounds(&mut self, bounds: Option<IntRect>) {
        self.renderer.set_bounds(bounds);
        self.bounds = bounds;
        self.update_bitmap_dimensions();
    }

    fn update_bitmap_dimensions(&mut self) {
        let bounds = self.bounds.filter(|b| !b.is_empty()).map(|b| b.size());
        let width = self
            .renderer
            .intrinsic_width()
            .or(bounds.map(|s| s.width))
            .filter(|w| *w > 0)
            .unwrap_or_else(|| self.image.width());
        let height = self
            .renderer
            .intrinsic_height()
            .or(bounds.map(|s| s.height))
            .filter(|h| *h > 0)
            .unwrap_or_else(|| self.image.height());
        self.bitmap_width = width;
        self.bitmap_height = height;
    }

    /// Bytes held by the frame cache.
    pub fn size_in_bytes(&self) -> usize {
        self.cache.size_in_bytes()
    }

    /// Release every cached frame.
    pub fn clear(&mut self) {
        self.cache.clear();
    }

    /// The animation stopped being drawn; release cached frames.
    pub fn on_inactive(&mut self) {
        tracing::debug!(backend = self.id, "inactive, clearing cached frames");
        self.clear();
    }

    /// Call [`Self::on_inactive`] once no draw happened for the inactivity timeout.
    pub fn check_inactivity(&mut self, now: Instant) -> bool {
        if !self.inactivity.poll(now) {
            return false;
        }
        self.on_inactive();
        true
    }
}

#[cfg(test)]
#[path = "../../tests/unit/backend/bitmap_backend.rs"]
mod tests;
