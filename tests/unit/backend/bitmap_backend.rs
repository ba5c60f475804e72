use std::sync::atomic::AtomicUsize;

use parking_lot::Mutex;

use super::*;
use crate::foundation::core::Rgba8Premul;
use crate::prepare::executor::InlineExecutor;
use crate::prepare::preparer::{DefaultFramePreparer, PrepareRequest};
use crate::prepare::strategy::FixedNumberPreparationStrategy;
use crate::render::factory::HeapBitmapFactory;
use crate::source::memory::{MemoryAnimatedImage, MemoryFrame};

#[derive(Default)]
struct ScriptedCache {
    cached: Option<BitmapRef>,
    offer_reuse: bool,
    fallback: Option<BitmapRef>,
    rendered: Mutex<Vec<(usize, FrameType)>>,
    clears: AtomicUsize,
}

impl BitmapFrameCache for ScriptedCache {
    fn cached_frame(&self, _frame: usize) -> Option<BitmapRef> {
        self.cached.clone()
    }
    fn fallback_frame(&self, _frame: usize) -> Option<BitmapRef> {
        self.fallback.clone()
    }
    fn bitmap_to_reuse_for_frame(&self, _frame: usize, w: u32, h: u32) -> Option<Bitmap> {
        self.offer_reuse.then(|| Bitmap::new(w, h).unwrap())
    }
    fn contains(&self, _frame: usize) -> bool {
        false
    }
    fn size_in_bytes(&self) -> usize {
        0
    }
    fn clear(&self) {
        self.clears.fetch_add(1, Ordering::SeqCst);
    }
    fn on_frame_rendered(&self, frame: usize, _bitmap: &BitmapRef, frame_type: FrameType) {
        self.rendered.lock().push((frame, frame_type));
    }
    fn on_frame_prepared(&self, _frame: usize, _bitmap: &BitmapRef, _frame_type: FrameType) {}
}

/// Fails the first `fail_first` renders.
struct ScriptedRenderer {
    fail_first: usize,
    calls: AtomicUsize,
    intrinsic: Option<u32>,
}

impl ScriptedRenderer {
    fn failing(fail_first: usize) -> Arc<Self> {
        Arc::new(Self {
            fail_first,
            calls: AtomicUsize::new(0),
            intrinsic: None,
        })
    }
}

impl FrameRenderer for ScriptedRenderer {
    fn render_frame(&self, _frame: usize, bitmap: &mut Bitmap) -> bool {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.fail_first {
            return false;
        }
        bitmap.fill_rect(bitmap.bounds(), Rgba8Premul::opaque(9, 9, 9));
        true
    }
    fn intrinsic_width(&self) -> Option<u32> {
        self.intrinsic
    }
    fn intrinsic_height(&self) -> Option<u32> {
        self.intrinsic
    }
    fn set_bounds(&self, _bounds: Option<IntRect>) {}
}

#[derive(Default)]
struct RecordingTarget {
    draws: Vec<(IntRect, IntRect)>,
}

impl DrawTarget for RecordingTarget {
    fn draw(&mut self, _bitmap: &Bitmap, src: IntRect, dst: IntRect) {
        self.draws.push((src, dst));
    }
    fn width(&self) -> u32 {
        100
    }
    fn height(&self) -> u32 {
        100
    }
}

type Log = Arc<Mutex<Vec<String>>>;

struct LogListener(Log);

impl FrameListener for LogListener {
    fn on_draw_frame_start(&mut self, frame: usize) {
        self.0.lock().push(format!("start {frame}"));
    }
    fn on_frame_drawn(&mut self, frame: usize, frame_type: FrameType) {
        self.0.lock().push(format!("drawn {frame} {frame_type:?}"));
    }
    fn on_frame_dropped(&mut self, frame: usize) {
        self.0.lock().push(format!("dropped {frame}"));
    }
}

impl AnimationListener for LogListener {
    fn on_animation_loaded(&mut self) {
        self.0.lock().push("loaded".to_owned());
    }
}

struct PanickingListener;

impl FrameListener for PanickingListener {
    fn on_draw_frame_start(&mut self, _frame: usize) {
        panic!("listener bug");
    }
}

#[derive(Default)]
struct CountingPreparer {
    requested: Mutex<Vec<usize>>,
}

impl FramePreparer for CountingPreparer {
    fn prepare_frame(&self, _ctx: &PrepareContext, frame: usize) -> PrepareRequest {
        self.requested.lock().push(frame);
        PrepareRequest::AlreadyCached
    }
}

fn image() -> ImageHandle {
    let pixels = Bitmap::solid(16, 16, Rgba8Premul::opaque(1, 2, 3)).unwrap();
    let image = MemoryAnimatedImage::new(16, 16)
        .with_frame(MemoryFrame::new(pixels.clone()))
        .with_frame(MemoryFrame::new(pixels.clone()))
        .with_frame(MemoryFrame::new(pixels))
        .with_loop_count(2);
    ImageHandle::new(image, crate::cache::key::ImageCacheKey(21)).unwrap()
}

fn backend(cache: Arc<ScriptedCache>, renderer: Arc<ScriptedRenderer>) -> BitmapAnimationBackend {
    BitmapAnimationBackend::new(image(), Arc::new(HeapBitmapFactory::new()), cache, renderer)
}

fn stale() -> BitmapRef {
    BitmapRef::new(Bitmap::new(16, 16).unwrap())
}

#[test]
fn cached_frame_is_drawn_and_reported_as_cached() {
    let cache = Arc::new(ScriptedCache {
        cached: Some(stale()),
        ..ScriptedCache::default()
    });
    let renderer = ScriptedRenderer::failing(0);
    let mut backend = backend(cache.clone(), renderer.clone());
    assert!(backend.draw_frame(&mut RecordingTarget::default(), 1));
    assert_eq!(*cache.rendered.lock(), vec![(1, FrameType::Cached)]);
    assert_eq!(renderer.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn failed_reuse_render_falls_through_to_created() {
    let cache = Arc::new(ScriptedCache {
        offer_reuse: true,
        fallback: Some(stale()),
        ..ScriptedCache::default()
    });
    let renderer = ScriptedRenderer::failing(1);
    let log = Log::default();
    let mut backend = backend(cache.clone(), renderer.clone())
        .with_frame_listener(Box::new(LogListener(log.clone())));

    assert!(backend.draw_frame(&mut RecordingTarget::default(), 2));
    assert_eq!(*cache.rendered.lock(), vec![(2, FrameType::Created)]);
    assert_eq!(renderer.calls.load(Ordering::SeqCst), 2);
    assert_eq!(*log.lock(), vec!["start 2", "drawn 2 Created"]);
}

#[test]
fn fallback_draw_is_never_reported_to_the_cache() {
    let cache = Arc::new(ScriptedCache {
        offer_reuse: true,
        fallback: Some(stale()),
        ..ScriptedCache::default()
    });
    let log = Log::default();
    let mut backend = backend(cache.clone(), ScriptedRenderer::failing(usize::MAX))
        .with_frame_listener(Box::new(LogListener(log.clone())));
    let mut target = RecordingTarget::default();

    assert!(backend.draw_frame(&mut target, 0));
    assert!(cache.rendered.lock().is_empty());
    assert_eq!(target.draws.len(), 1);
    assert_eq!(log.lock().last().map(String::as_str), Some("drawn 0 Fallback"));
}

#[test]
fn nothing_to_draw_drops_the_frame() {
    let cache = Arc::new(ScriptedCache::default());
    let log = Log::default();
    let mut backend = backend(cache.clone(), ScriptedRenderer::failing(usize::MAX))
        .with_frame_listener(Box::new(LogListener(log.clone())));
    let mut target = RecordingTarget::default();

    assert!(!backend.draw_frame(&mut target, 0));
    assert!(target.draws.is_empty());
    assert_eq!(*log.lock(), vec!["start 0", "dropped 0"]);
}

#[test]
fn allocation_failure_drops_without_fallback() {
    let cache = Arc::new(ScriptedCache {
        fallback: Some(stale()),
        ..ScriptedCache::default()
    });
    let renderer = ScriptedRenderer::failing(0);
    let mut backend = BitmapAnimationBackend::new(
        image(),
        Arc::new(HeapBitmapFactory::with_max_bitmap_bytes(0)),
        cache.clone(),
        renderer.clone(),
    );
    let mut target = RecordingTarget::default();
    assert!(!backend.draw_frame(&mut target, 0));
    assert!(target.draws.is_empty());
    assert_eq!(renderer.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn panicking_listener_does_not_break_drawing() {
    let cache = Arc::new(ScriptedCache::default());
    let log = Log::default();
    let mut backend = backend(cache, ScriptedRenderer::failing(0))
        .with_frame_listener(Box::new(PanickingListener))
        .with_frame_listener(Box::new(LogListener(log.clone())));
    assert!(backend.draw_frame(&mut RecordingTarget::default(), 0));
    assert_eq!(*log.lock(), vec!["start 0", "drawn 0 Created"]);
}

#[test]
fn preparation_runs_even_when_the_draw_fails() {
    let cache = Arc::new(ScriptedCache::default());
    let preparer = Arc::new(CountingPreparer::default());
    let mut backend = backend(cache, ScriptedRenderer::failing(usize::MAX)).with_preparation(
        Box::new(FixedNumberPreparationStrategy::new(1)),
        preparer.clone(),
    );
    assert!(!backend.draw_frame(&mut RecordingTarget::default(), 2));
    assert_eq!(*preparer.requested.lock(), vec![0]);
}

#[test]
fn bitmap_size_follows_renderer_then_bounds_then_image() {
    let cache = Arc::new(ScriptedCache::default());
    let mut plain = backend(cache.clone(), ScriptedRenderer::failing(0));
    assert_eq!((plain.intrinsic_width(), plain.intrinsic_height()), (16, 16));
    plain.set_bounds(Some(IntRect::from_xywh(5, 5, 8, 4)));
    assert_eq!((plain.intrinsic_width(), plain.intrinsic_height()), (8, 4));

    let mut target = RecordingTarget::default();
    assert!(plain.draw_frame(&mut target, 0));
    assert_eq!(
        target.draws,
        vec![(IntRect::from_xywh(0, 0, 8, 4), IntRect::from_xywh(5, 5, 8, 4))]
    );

    let sized = Arc::new(ScriptedRenderer {
        fail_first: 0,
        calls: AtomicUsize::new(0),
        intrinsic: Some(6),
    });
    let mut fixed = backend(cache, sized);
    fixed.set_bounds(Some(IntRect::from_xywh(0, 0, 8, 4)));
    assert_eq!((fixed.intrinsic_width(), fixed.intrinsic_height()), (6, 6));
}

#[test]
fn preload_without_preparation_reports_loaded_immediately() {
    let log = Log::default();
    let mut backend = backend(Arc::new(ScriptedCache::default()), ScriptedRenderer::failing(0))
        .with_animation_listener(Box::new(LogListener(log.clone())));
    backend.preload_animation();
    assert_eq!(*log.lock(), vec!["loaded"]);
}

#[test]
fn inactivity_clears_the_cache_once() {
    let cache = Arc::new(ScriptedCache::default());
    let mut backend = backend(cache.clone(), ScriptedRenderer::failing(0))
        .with_inactivity_timeout(Duration::from_millis(50));
    assert!(backend.draw_frame(&mut RecordingTarget::default(), 0));

    let later = Instant::now() + Duration::from_secs(1);
    assert!(backend.check_inactivity(later));
    assert!(!backend.check_inactivity(later));
    assert_eq!(cache.clears.load(Ordering::SeqCst), 1);
}

#[test]
fn metadata_comes_from_the_image() {
    let backend = backend(Arc::new(ScriptedCache::default()), ScriptedRenderer::failing(0));
    assert_eq!(backend.frame_count(), 3);
    assert_eq!(backend.frame_duration_ms(1), 100);
    assert_eq!(backend.loop_duration_ms(), 300);
    assert_eq!(backend.loop_count(), 2);
    assert_eq!(backend.with_loop_count_override(Some(5)).loop_count(), 5);
}

#[test]
fn foreign_events_are_ignored() {
    let log = Log::default();
    let mut backend = backend(Arc::new(ScriptedCache::default()), ScriptedRenderer::failing(0))
        .with_frame_listener(Box::new(LogListener(log.clone())));
    backend.event_sender().post(PreparerEvent::PreparationFailed {
        backend_id: backend.id() + 1000,
        frame: 0,
        reason: "elsewhere".to_owned(),
    });
    assert_eq!(backend.run_pending_events(), 1);
    assert!(log.lock().is_empty());
}

#[test]
fn out_of_range_frame_is_dropped_before_any_stage_runs() {
    let cache = Arc::new(ScriptedCache {
        offer_reuse: true,
        fallback: Some(stale()),
        ..ScriptedCache::default()
    });
    let renderer = ScriptedRenderer::failing(0);
    let log = Log::default();
    let mut backend = backend(cache.clone(), renderer.clone())
        .with_frame_listener(Box::new(LogListener(log.clone())));
    let mut target = RecordingTarget::default();

    assert!(!backend.draw_frame(&mut target, 3));
    assert!(target.draws.is_empty());
    assert_eq!(renderer.calls.load(Ordering::SeqCst), 0);
    assert!(cache.rendered.lock().is_empty());
    assert_eq!(*log.lock(), vec!["start 3", "dropped 3"]);
}

#[test]
fn preload_completes_when_events_overflow_the_queue() {
    let factory: Arc<dyn BitmapFactory> = Arc::new(HeapBitmapFactory::new());
    let preparer = Arc::new(DefaultFramePreparer::new(
        factory.clone(),
        Arc::new(InlineExecutor),
    ));
    let log = Log::default();
    let mut backend = BitmapAnimationBackend::new(
        image(),
        factory,
        Arc::new(ScriptedCache::default()),
        ScriptedRenderer::failing(0),
    )
    .with_event_queue_capacity(1)
    .with_preparation(Box::new(FixedNumberPreparationStrategy::new(3)), preparer)
    .with_animation_listener(Box::new(LogListener(log.clone())));

    backend.preload_animation();
    assert_eq!(*log.lock(), vec!["loaded"]);

    for frame in 0..3 {
        backend.draw_frame(&mut RecordingTarget::default(), frame);
    }
    assert_eq!(*log.lock(), vec!["loaded"]);
}
