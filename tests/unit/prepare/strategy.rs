use std::sync::Arc;

use parking_lot::Mutex;

use super::*;
use crate::backend::renderer::FrameRenderer;
use crate::cache::bitmap_cache::{BitmapFrameCache, FrameType};
use crate::foundation::core::IntRect;
use crate::prepare::dispatch::EventQueue;
use crate::render::bitmap::{Bitmap, BitmapRef};

struct CachedFrames(Vec<usize>);

impl BitmapFrameCache for CachedFrames {
    fn cached_frame(&self, _frame: usize) -> Option<BitmapRef> {
        None
    }
    fn fallback_frame(&self, _frame: usize) -> Option<BitmapRef> {
        None
    }
    fn bitmap_to_reuse_for_frame(&self, _frame: usize, _w: u32, _h: u32) -> Option<Bitmap> {
        None
    }
    fn contains(&self, frame: usize) -> bool {
        self.0.contains(&frame)
    }
    fn size_in_bytes(&self) -> usize {
        0
    }
    fn clear(&self) {}
    fn on_frame_rendered(&self, _frame: usize, _bitmap: &BitmapRef, _frame_type: FrameType) {}
    fn on_frame_prepared(&self, _frame: usize, _bitmap: &BitmapRef, _frame_type: FrameType) {}
}

struct NullRenderer;

impl FrameRenderer for NullRenderer {
    fn render_frame(&self, _frame: usize, _bitmap: &mut Bitmap) -> bool {
        true
    }
    fn intrinsic_width(&self) -> Option<u32> {
        None
    }
    fn intrinsic_height(&self) -> Option<u32> {
        None
    }
    fn set_bounds(&self, _bounds: Option<IntRect>) {}
}

#[derive(Default)]
struct Recorder {
    requested: Mutex<Vec<usize>>,
    accept: usize,
}

impl FramePreparer for Recorder {
    fn prepare_frame(&self, _ctx: &PrepareContext, frame: usize) -> PrepareRequest {
        let mut requested = self.requested.lock();
        requested.push(frame);
        if requested.len() <= self.accept {
            PrepareRequest::Scheduled
        } else {
            PrepareRequest::Rejected
        }
    }
}

fn ctx(frame_count: usize, cached: Vec<usize>, queue: &EventQueue) -> PrepareContext {
    PrepareContext {
        backend_id: 1,
        frame_count,
        width: 4,
        height: 4,
        cache: Arc::new(CachedFrames(cached)),
        renderer: Arc::new(NullRenderer),
        events: queue.sender(),
    }
}

fn recorder(accept: usize) -> Recorder {
    Recorder {
        accept,
        ..Recorder::default()
    }
}

#[test]
fn requests_following_frames_with_wrap_around() {
    let queue = EventQueue::bounded(8);
    let preparer = recorder(usize::MAX);
    let awaited = FixedNumberPreparationStrategy::new(3).prepare_frames(
        &preparer,
        &ctx(5, Vec::new(), &queue),
        3,
    );
    assert_eq!(*preparer.requested.lock(), vec![4, 0, 1]);
    assert_eq!(awaited.as_slice(), &[4, 0, 1]);
}

#[test]
fn never_requests_more_than_the_other_frames() {
    let queue = EventQueue::bounded(8);
    let preparer = recorder(usize::MAX);
    FixedNumberPreparationStrategy::new(10).prepare_frames(
        &preparer,
        &ctx(3, Vec::new(), &queue),
        0,
    );
    assert_eq!(*preparer.requested.lock(), vec![1, 2]);

    let single = recorder(usize::MAX);
    FixedNumberPreparationStrategy::new(10).prepare_frames(
        &single,
        &ctx(1, Vec::new(), &queue),
        0,
    );
    assert!(single.requested.lock().is_empty());
}

#[test]
fn cached_frames_are_skipped() {
    let queue = EventQueue::bounded(8);
    let preparer = recorder(usize::MAX);
    FixedNumberPreparationStrategy::new(3).prepare_frames(
        &preparer,
        &ctx(6, vec![2, 3], &queue),
        1,
    );
    assert_eq!(*preparer.requested.lock(), vec![4]);
}

#[test]
fn stops_at_first_rejection() {
    let queue = EventQueue::bounded(8);
    let preparer = recorder(1);
    let awaited = FixedNumberPreparationStrategy::new(3).prepare_frames(
        &preparer,
        &ctx(6, Vec::new(), &queue),
        0,
    );
    assert_eq!(*preparer.requested.lock(), vec![1, 2]);
    assert_eq!(awaited.as_slice(), &[1]);
}

#[test]
fn preload_starts_at_the_first_frame() {
    let queue = EventQueue::bounded(8);
    let preparer = recorder(usize::MAX);
    let awaited = FixedNumberPreparationStrategy::default()
        .preload_frames(&preparer, &ctx(2, Vec::new(), &queue));
    assert_eq!(awaited.as_slice(), &[0, 1]);
}
