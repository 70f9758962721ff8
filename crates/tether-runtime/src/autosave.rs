#![forbid(unsafe_code)]

//! Debounced autosave scheduling.
//!
//! [`AutosaveScheduler`] turns bursts of mutations into one flush. Every
//! [`schedule`](AutosaveScheduler::schedule) re-arms a single timer; the
//! flush becomes due only after a quiet period. Label edits use a shorter
//! window than structural mutations.
//!
//! Alongside the timer it tracks the tree-node ids mutated since the last
//! flush. [`take_changed`](AutosaveScheduler::take_changed) drains that set
//! atomically when the flush payload is built.
//!
//! # Invariants
//!
//! 1. At most one flush is pending.
//! 2. `poll` reports a due flush at most once per quiet period.
//! 3. The changed set is cleared only by `take_changed`.

use std::collections::BTreeSet;
use std::time::Duration;

use tether_core::debounce::Debouncer;
use web_time::Instant;

/// Delays used by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutosaveConfig {
    /// Quiet period after a structural mutation.
    pub mutation_delay: Duration,
    /// Quiet period after a committed label edit.
    pub label_edit_delay: Duration,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            mutation_delay: Duration::from_millis(2000),
            label_edit_delay: Duration::from_millis(300),
        }
    }
}

/// What caused a flush to be scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveTrigger {
    /// Structural change, drag, undo/redo.
    Mutation,
    /// Committed inline label edit.
    LabelEdit,
}

/// Single-timer autosave debouncer with changed-id tracking.
#[derive(Debug, Clone, Default)]
pub struct AutosaveScheduler {
    config: AutosaveConfig,
    timer: Debouncer,
    changed: BTreeSet<String>,
    flushes: u64,
}

impl AutosaveScheduler {
    #[must_use]
    pub fn new(config: AutosaveConfig) -> Self {
        Self {
            config,
            timer: Debouncer::new(),
            changed: BTreeSet::new(),
            flushes: 0,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AutosaveConfig {
        &self.config
    }

    /// Arm (or re-arm) the flush timer.
    pub fn schedule(&mut self, now: Instant, trigger: SaveTrigger) {
        let delay = match trigger {
            SaveTrigger::Mutation => self.config.mutation_delay,
            SaveTrigger::LabelEdit => self.config.label_edit_delay,
        };
        let replaced = self.timer.arm(now, delay);
        tracing::trace!(
            ?trigger,
            delay_ms = delay.as_millis() as u64,
            replaced,
            "autosave scheduled"
        );
    }

    /// Drop the pending flush (used when an explicit save supersedes it).
    pub fn cancel(&mut self) -> bool {
        self.timer.cancel()
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.timer.is_pending()
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.timer.deadline()
    }

    /// Whether a flush is due at `now`. Returns `true` once per quiet period.
    pub fn poll(&mut self, now: Instant) -> bool {
        let due = self.timer.poll(now);
        if due {
            self.flushes += 1;
        }
        due
    }

    /// Record a mutated tree node.
    pub fn note_changed(&mut self, id: &str) {
        if !self.changed.contains(id) {
            self.changed.insert(id.to_string());
        }
    }

    /// Forget a node that no longer exists.
    pub fn forget(&mut self, id: &str) {
        self.changed.remove(id);
    }

    #[must_use]
    pub fn changed(&self) -> &BTreeSet<String> {
        &self.changed
    }

    /// Drain the changed set.
    pub fn take_changed(&mut self) -> BTreeSet<String> {
        std::mem::take(&mut self.changed)
    }

    /// Number of timer-driven flushes reported so far.
    #[must_use]
    pub fn flush_count(&self) -> u64 {
        self.flushes
    }
}
