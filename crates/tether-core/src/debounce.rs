#![forbid(unsafe_code)]

//! Single-deadline debounce timer.
//!
//! A [`Debouncer`] holds at most one pending deadline. Arming it while a
//! deadline is pending replaces that deadline, so a burst of arms fires
//! once, `delay` after the last arm. The timer never reads a clock; callers
//! pass `now` and poll.
//!
//! # Invariants
//!
//! 1. At most one deadline is pending.
//! 2. `poll(now)` returns `true` at most once per armed deadline.
//! 3. `cancel()` clears the deadline without firing.

use std::time::Duration;

use web_time::Instant;

/// Trailing-edge debounce timer.
#[derive(Debug, Clone, Default)]
pub struct Debouncer {
    deadline: Option<Instant>,
}

impl Debouncer {
    #[must_use]
    pub const fn new() -> Self {
        Self { deadline: None }
    }

    /// Arm (or re-arm) the timer to fire `delay` after `now`.
    ///
    /// Returns `true` if a pending deadline was replaced.
    pub fn arm(&mut self, now: Instant, delay: Duration) -> bool {
        self.deadline.replace(now + delay).is_some()
    }

    /// Drop the pending deadline without firing.
    pub fn cancel(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Fire if the deadline has passed. Clears the deadline when it fires.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}
