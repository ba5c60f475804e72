use smallvec::SmallVec;

use crate::prepare::preparer::{FramePreparer, PrepareContext};

/// Frames whose preparation outcome will be reported through the event queue.
pub type AwaitedFrames = SmallVec<[usize; 4]>;

/// Decides which frames to prepare around a draw.
pub trait FramePreparationStrategy: Send {
    /// Called after every draw attempt of `last_drawn`.
    fn prepare_frames(
        &self,
        preparer: &dyn FramePreparer,
        ctx: &PrepareContext,
        last_drawn: usize,
    ) -> AwaitedFrames;

    /// Called once before the first draw.
    fn preload_frames(&self, preparer: &dyn FramePreparer, ctx: &PrepareContext)
    -> AwaitedFrames;
}

/// Prepares a fixed number of frames following the one just drawn, wrapping around the loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FixedNumberPreparationStrategy {
    frames_to_prepare: usize,
}

/// Frames prepared ahead when nothing else is configured.
pub const DEFAULT_FRAMES_TO_PREPARE: usize = 3;

impl FixedNumberPreparationStrategy {
    /// Prepare up to `frames_to_prepare` frames ahead.
    pub fn new(frames_to_prepare: usize) -> Self {
        Self { frames_to_prepare }
    }

    /// Configured look-ahead.
    pub fn frames_to_prepare(&self) -> usize {
        self.frames_to_prepare
    }

    fn request_all(
        preparer: &dyn FramePreparer,
        ctx: &PrepareContext,
        frames: impl Iterator<Item = usize>,
    ) -> AwaitedFrames {
        let mut awaited = AwaitedFrames::new();
        for frame in frames {
            if ctx.cache.contains(frame) {
                continue;
            }
            let request = preparer.prepare_frame(ctx, frame);
            if request.will_report() {
                awaited.push(frame);
            }
            if !request.is_accepted() {
                break;
            }
        }
        awaited
    }
}

impl Default for FixedNumberPreparationStrategy {
    fn default() -> Self {
        Self::new(DEFAULT_FRAMES_TO_PREPARE)
    }
}

impl FramePreparationStrategy for FixedNumberPreparationStrategy {
    fn prepare_frames(
        &self,
        preparer: &dyn FramePreparer,
        ctx: &PrepareContext,
        last_drawn: usize,
    ) -> AwaitedFrames {
        let count = ctx.frame_count;
        if count == 0 {
            return AwaitedFrames::new();
        }
        let ahead = self.frames_to_prepare.min(count - 1);
        let frames = (1..=ahead).map(|i| (last_drawn % count + i) % count);
        Self::request_all(preparer, ctx, frames)
    }

    fn preload_frames(
        &self,
        preparer: &dyn FramePreparer,
        ctx: &PrepareContext,
    ) -> AwaitedFrames {
        let frames = 0..self.frames_to_prepare.min(ctx.frame_count);
        Self::request_all(preparer, ctx, frames)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/prepare/strategy.rs"]
mod tests;
