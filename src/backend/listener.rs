use std::panic::{self, AssertUnwindSafe};

use crate::cache::bitmap_cache::FrameType;

/// Per-frame diagnostics. Listeners never influence what gets drawn.
pub trait FrameListener: Send {
    /// A draw of `frame` is starting.
    fn on_draw_frame_start(&mut self, _frame: usize) {}

    /// `frame` was drawn from the `frame_type` stage.
    fn on_frame_drawn(&mut self, _frame: usize, _frame_type: FrameType) {}

    /// No stage could draw `frame`.
    fn on_frame_dropped(&mut self, _frame: usize) {}

    /// `frame` was rendered ahead of time.
    fn on_frame_prepared(&mut self, _frame: usize, _frame_type: FrameType) {}

    /// Rendering `frame` ahead of time failed.
    fn on_preparation_failed(&mut self, _frame: usize) {}
}

/// Animation-level notifications.
pub trait AnimationListener: Send {
    /// The frames requested by `preload_animation` are ready.
    fn on_animation_loaded(&mut self);
}

/// Invoke `callback` on every listener, logging and swallowing panics.
pub(crate) fn notify_each<L: ?Sized>(
    listeners: &mut [Box<L>],
    callback_name: &'static str,
    mut callback: impl FnMut(&mut L),
) {
    for listener in listeners.iter_mut() {
        let listener = listener.as_mut();
        if panic::catch_unwind(AssertUnwindSafe(|| callback(listener))).is_err() {
            tracing::warn!(callback = callback_name, "listener panicked");
        }
    }
}
