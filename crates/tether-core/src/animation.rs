#![forbid(unsafe_code)]

//! Eased scroll animation.
//!
//! [`ScrollAnimation`] interpolates a scroll offset from a start to a target
//! over a fixed duration with an ease-out-cubic curve. It is sampled with an
//! explicit `now`; the host drives it from its frame callback.
//!
//! # Failure Modes
//!
//! - Zero duration: the first sample returns the target and completes.
//! - Sampling before the start instant: returns the start offset.

use std::time::Duration;

use web_time::Instant;

use crate::geometry::Point;

/// Ease-out cubic: `1 - (1 - t)^3`, with `t` clamped to `[0, 1]`.
#[must_use]
pub fn ease_out_cubic(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    let inv = 1.0 - t;
    1.0 - inv * inv * inv
}

/// An in-flight scroll from `from` to `to`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollAnimation {
    from: Point,
    to: Point,
    started_at: Instant,
    duration: Duration,
}

impl ScrollAnimation {
    #[must_use]
    pub fn new(from: Point, to: Point, started_at: Instant, duration: Duration) -> Self {
        Self {
            from,
            to,
            started_at,
            duration,
        }
    }

    #[must_use]
    pub fn target(&self) -> Point {
        self.to
    }

    /// Linear progress in `[0, 1]`.
    #[must_use]
    pub fn progress(&self, now: Instant) -> f64 {
        if self.duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(self.started_at);
        (elapsed.as_secs_f64() / self.duration.as_secs_f64()).min(1.0)
    }

    /// Offset at `now`.
    #[must_use]
    pub fn sample(&self, now: Instant) -> Point {
        let eased = ease_out_cubic(self.progress(now));
        Point::new(
            self.from.x + (self.to.x - self.from.x) * eased,
            self.from.y + (self.to.y - self.from.y) * eased,
        )
    }

    #[must_use]
    pub fn is_complete(&self, now: Instant) -> bool {
        self.progress(now) >= 1.0
    }
}
