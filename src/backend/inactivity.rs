use std::time::{Duration, Instant};

/// Delay without draws after which an animation counts as inactive.
pub const DEFAULT_INACTIVITY_TIMEOUT: Duration = Duration::from_millis(2000);

/// Reports inactivity once per idle period.
#[derive(Clone, Debug)]
pub struct InactivityMonitor {
    timeout: Duration,
    last_draw: Option<Instant>,
    notified: bool,
}

impl InactivityMonitor {
    /// Monitor firing after `timeout` without draws.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            last_draw: None,
            notified: false,
        }
    }

    /// Configured timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Record a draw at `now`, re-arming the monitor.
    pub fn record_draw(&mut self, now: Instant) {
        self.last_draw = Some(now);
        self.notified = false;
    }

    /// Return `true` exactly once when `now` is at least `timeout` past the last draw.
    pub fn poll(&mut self, now: Instant) -> bool {
        let Some(last_draw) = self.last_draw else {
            return false;
        };
        if self.notified || now.saturating_duration_since(last_draw) < self.timeout {
            return false;
        }
        self.notified = true;
        true
    }
}

impl Default for InactivityMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_INACTIVITY_TIMEOUT)
    }
}
