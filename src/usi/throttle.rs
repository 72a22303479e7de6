//! Evaluation-line sampling.
//!
//! [`InfoThrottler`] forwards at most one evaluation line per window. Lines
//! arriving inside the window overwrite a single pending slot; the slot is
//! only released when a later line arrives after the window has elapsed.
//! Nothing is ever scheduled, so a pending line is dropped if the engine goes
//! quiet. Continuous analysis produces lines often enough that this is not
//! observable in practice.

use std::time::Duration;

use tokio::time::Instant;

/// Minimum spacing between two forwarded evaluation lines.
pub const THROTTLE_WINDOW: Duration = Duration::from_millis(500);

/// At-most-one-per-window sampling filter.
#[derive(Debug, Clone)]
pub struct InfoThrottler {
    window: Duration,
    last_emit: Instant,
    pending: Option<String>,
}

impl InfoThrottler {
    /// Create a throttler whose first window starts at `now`.
    #[must_use]
    pub fn new(now: Instant) -> Self {
        Self::with_window(THROTTLE_WINDOW, now)
    }

    /// Create a throttler with a custom window.
    #[must_use]
    pub fn with_window(window: Duration, now: Instant) -> Self {
        Self {
            window,
            last_emit: now,
            pending: None,
        }
    }

    /// Record `line` and return it if the window since the last emission has
    /// elapsed.
    ///
    /// The returned value is always the line just observed: a newer line
    /// supersedes whatever was pending.
    pub fn observe(&mut self, line: String, now: Instant) -> Option<String> {
        self.pending = Some(line);

        if now.saturating_duration_since(self.last_emit) > self.window {
            self.last_emit = now;
            return self.pending.take();
        }

        None
    }

    /// Line held back by the last [`observe`](Self::observe), if any.
    #[must_use]
    pub fn pending(&self) -> Option<&str> {
        self.pending.as_deref()
    }

    /// Forget the pending line and restart the window at `now`.
    pub fn reset(&mut self, now: Instant) {
        self.last_emit = now;
        self.pending = None;
    }
}
