#![forbid(unsafe_code)]

//! Bounded snapshot history with a cursor.
//!
//! [`History`] stores whole-state snapshots in a single ordered list and a
//! cursor pointing at the snapshot that matches what is on screen. Undo and
//! redo only move the cursor; pushing truncates everything after it.
//!
//! # Architecture
//!
//! ```text
//! push(s0..s3)            entries: [s0, s1, s2, s3]   cursor: 3
//! undo() x2               entries: [s0, s1, s2, s3]   cursor: 1
//! push(s4) (prunes redo)  entries: [s0, s1, s4]       cursor: 2
//! ```
//!
//! # Invariants
//!
//! 1. Empty history has no cursor; otherwise `cursor < len()`.
//! 2. `len() <= config.max_depth` after every push; the oldest entry is
//!    evicted first.
//! 3. Pushing a state equal to `current()` is a no-op.
//! 4. A push after one or more undos discards every entry after the cursor.
//!
//! Snapshots are kept behind [`Arc`] so undo/redo hand out cheap clones.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

/// Configuration for the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryConfig {
    /// Maximum number of snapshots retained.
    pub max_depth: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { max_depth: 50 }
    }
}

impl HistoryConfig {
    #[must_use]
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    /// Create an unlimited configuration (for testing).
    #[must_use]
    pub fn unlimited() -> Self {
        Self {
            max_depth: usize::MAX,
        }
    }
}

/// What a push did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Equal to the current snapshot; nothing recorded.
    Deduplicated,
    /// Appended after the cursor.
    Appended {
        /// Number of redo entries discarded.
        pruned: usize,
        /// Whether the oldest entry was evicted to respect the bound.
        evicted: bool,
    },
}

impl PushOutcome {
    #[must_use]
    pub const fn recorded(&self) -> bool {
        matches!(self, Self::Appended { .. })
    }
}

/// Snapshot history with a cursor.
pub struct History<T> {
    entries: VecDeque<Arc<T>>,
    cursor: Option<usize>,
    config: HistoryConfig,
}

impl<T> fmt::Debug for History<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("History")
            .field("len", &self.entries.len())
            .field("cursor", &self.cursor)
            .field("config", &self.config)
            .finish()
    }
}

impl<T> History<T> {
    #[must_use]
    pub fn new(config: HistoryConfig) -> Self {
        Self {
            entries: VecDeque::new(),
            cursor: None,
            config,
        }
    }

    #[must_use]
    pub fn with_default_config() -> Self {
        Self::new(HistoryConfig::default())
    }

    /// Rebuild a history from stored entries and cursor.
    ///
    /// No validation happens here; call [`ensure_well_formed`](Self::ensure_well_formed)
    /// before relying on the result.
    #[must_use]
    pub fn from_parts(entries: Vec<T>, cursor: Option<usize>, config: HistoryConfig) -> Self {
        Self {
            entries: entries.into_iter().map(Arc::new).collect(),
            cursor,
            config,
        }
    }

    // ====================================================================
    // Navigation
    // ====================================================================

    /// Step back one snapshot and return it.
    pub fn undo(&mut self) -> Option<Arc<T>> {
        let cursor = self.cursor.filter(|&c| c > 0 && c < self.entries.len())?;
        self.cursor = Some(cursor - 1);
        self.entries.get(cursor - 1).cloned()
    }

    /// Step forward one snapshot and return it.
    pub fn redo(&mut self) -> Option<Arc<T>> {
        let next = self.cursor.map(|c| c + 1).filter(|&n| n < self.entries.len())?;
        self.cursor = Some(next);
        self.entries.get(next).cloned()
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.cursor.is_some_and(|c| c > 0 && c < self.entries.len())
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.cursor.is_some_and(|c| c + 1 < self.entries.len())
    }

    // ====================================================================
    // Queries
    // ====================================================================

    /// The snapshot at the cursor.
    #[must_use]
    pub fn current(&self) -> Option<&Arc<T>> {
        self.cursor.and_then(|c| self.entries.get(c))
    }

    #[must_use]
    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    /// Entries oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<T>> {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = None;
    }

    // ====================================================================
    // Repair
    // ====================================================================

    /// Whether the cursor and bound invariants hold.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        let len = self.entries.len();
        let cursor_ok = match self.cursor {
            None => len == 0,
            Some(c) => c < len,
        };
        cursor_ok && len <= self.config.max_depth.max(1)
    }

    /// Reset to empty if malformed. Returns `true` when a repair happened.
    pub fn ensure_well_formed(&mut self) -> bool {
        if self.is_well_formed() {
            return false;
        }
        tracing::warn!(
            len = self.entries.len(),
            cursor = ?self.cursor,
            max_depth = self.config.max_depth,
            "history malformed; resetting"
        );
        self.clear();
        true
    }

    fn enforce_depth(&mut self) -> bool {
        let max = self.config.max_depth.max(1);
        let mut evicted = false;
        while self.entries.len() > max {
            self.entries.pop_front();
            evicted = true;
        }
        evicted
    }
}

impl<T: PartialEq> History<T> {
    /// Record a new snapshot after the cursor.
    pub fn push(&mut self, state: T) -> PushOutcome {
        if self.current().is_some_and(|cur| **cur == state) {
            return PushOutcome::Deduplicated;
        }

        let keep = self.cursor.map_or(0, |c| c + 1);
        let pruned = self.entries.len().saturating_sub(keep);
        self.entries.truncate(keep);
        self.entries.push_back(Arc::new(state));
        let evicted = self.enforce_depth();
        self.cursor = Some(self.entries.len() - 1);

        PushOutcome::Appended { pruned, evicted }
    }
}
