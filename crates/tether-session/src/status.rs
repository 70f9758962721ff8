#![forbid(unsafe_code)]

//! Transient status indicator ("Auto-saved", "Saved!", "Refreshed!").

use std::time::Duration;

use web_time::Instant;

/// Status messages the session can show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    AutoSaved,
    Saved,
    Refreshed,
}

impl StatusKind {
    #[must_use]
    pub const fn text(self) -> &'static str {
        match self {
            Self::AutoSaved => "Auto-saved",
            Self::Saved => "Saved!",
            Self::Refreshed => "Refreshed!",
        }
    }
}

/// Shows one message at a time until it expires.
#[derive(Debug, Clone, Default)]
pub struct StatusIndicator {
    current: Option<(StatusKind, Instant)>,
}

impl StatusIndicator {
    /// Show `kind` until `now + duration`, replacing any current message.
    pub fn show(&mut self, kind: StatusKind, now: Instant, duration: Duration) {
        self.current = Some((kind, now + duration));
    }

    /// The visible message at `now`, if any.
    #[must_use]
    pub fn visible(&self, now: Instant) -> Option<StatusKind> {
        self.current
            .filter(|(_, until)| now < *until)
            .map(|(kind, _)| kind)
    }

    pub fn clear(&mut self) {
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_expires() {
        let t0 = Instant::now();
        let mut s = StatusIndicator::default();
        assert_eq!(s.visible(t0), None);
        s.show(StatusKind::Saved, t0, Duration::from_millis(2000));
        assert_eq!(s.visible(t0 + Duration::from_millis(1999)), Some(StatusKind::Saved));
        assert_eq!(s.visible(t0 + Duration::from_millis(2000)), None);
        assert_eq!(StatusKind::Saved.text(), "Saved!");
    }

    #[test]
    fn newer_message_replaces_older() {
        let t0 = Instant::now();
        let mut s = StatusIndicator::default();
        s.show(StatusKind::AutoSaved, t0, Duration::from_millis(1500));
        s.show(StatusKind::Refreshed, t0 + Duration::from_millis(10), Duration::from_millis(1500));
        assert_eq!(s.visible(t0 + Duration::from_millis(20)), Some(StatusKind::Refreshed));
    }
}
