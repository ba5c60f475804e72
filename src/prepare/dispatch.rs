use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use parking_lot::Mutex;

use crate::cache::bitmap_cache::FrameType;

/// Events queued by background preparation for the render thread.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PreparerEvent {
    /// `frame` was rendered ahead of time.
    FramePrepared {
        /// Backend the frame belongs to.
        backend_id: u64,
        /// Prepared frame.
        frame: usize,
        /// Buffer source used.
        frame_type: FrameType,
    },
    /// Rendering `frame` ahead of time failed.
    PreparationFailed {
        /// Backend the frame belongs to.
        backend_id: u64,
        /// Frame that failed.
        frame: usize,
        /// Error text.
        reason: String,
    },
}

impl PreparerEvent {
    /// Backend the event is addressed to.
    pub fn backend_id(&self) -> u64 {
        match self {
            Self::FramePrepared { backend_id, .. } | Self::PreparationFailed { backend_id, .. } => {
                *backend_id
            }
        }
    }

    /// Frame the event is about.
    pub fn frame(&self) -> usize {
        match self {
            Self::FramePrepared { frame, .. } | Self::PreparationFailed { frame, .. } => *frame,
        }
    }
}

type DroppedFrames = Arc<Mutex<Vec<usize>>>;

/// Bounded queue of [`PreparerEvent`]s, drained on the render thread.
///
/// Events that do not fit are discarded, but the frames they were about are remembered so the
/// render thread still learns that their jobs finished.
pub struct EventQueue {
    sender: Sender<PreparerEvent>,
    receiver: Receiver<PreparerEvent>,
    dropped: DroppedFrames,
}

impl EventQueue {
    /// Queue holding at most `capacity` undelivered events (at least one).
    pub fn bounded(capacity: usize) -> Self {
        let (sender, receiver) = crossbeam_channel::bounded(capacity.max(1));
        Self {
            sender,
            receiver,
            dropped: DroppedFrames::default(),
        }
    }

    /// Handle for posting into this queue from any thread.
    pub fn sender(&self) -> EventSender {
        EventSender {
            sender: self.sender.clone(),
            dropped: self.dropped.clone(),
        }
    }

    /// Undelivered events.
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    /// Return `true` when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Take every queued event in posting order.
    pub fn drain(&self) -> Vec<PreparerEvent> {
        self.receiver.try_iter().collect()
    }

    /// Take the frames whose events were discarded on a full queue.
    pub fn take_dropped(&self) -> Vec<usize> {
        std::mem::take(&mut *self.dropped.lock())
    }
}

/// Posting side of an [`EventQueue`].
#[derive(Clone, Debug)]
pub struct EventSender {
    sender: Sender<PreparerEvent>,
    dropped: DroppedFrames,
}

impl EventSender {
    /// Post `event` without blocking; a full queue drops it and records its frame.
    pub fn post(&self, event: PreparerEvent) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                tracing::debug!(frame = event.frame(), "event queue full, dropping event");
                self.dropped.lock().push(event.frame());
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}
