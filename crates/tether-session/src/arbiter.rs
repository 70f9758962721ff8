#![forbid(unsafe_code)]

//! Edit-mode arbitration.
//!
//! At most one node, tree or floating, is in inline-edit mode at any time.
//! [`EditArbiter`] owns that exclusivity: [`begin`](EditArbiter::begin)
//! refuses while an edit is active, and [`finish`](EditArbiter::finish)
//! always returns the arbiter to idle, whether the edit is committed or
//! cancelled.
//!
//! # State machine
//!
//! ```text
//!            begin(tree)                 finish(commit|cancel)
//!   Idle ───────────────▶ EditingTreeNode ─────────────────────▶ Idle
//!     │      begin(floating)                                     ▲
//!     └──────────────────▶ EditingFloatingNode ──────────────────┘
//! ```
//!
//! While editing, every key goes to the arbiter: Enter commits, Shift+Enter
//! inserts a line break, Escape cancels, everything else edits the buffer.

use tether_core::event::{KeyCode, KeyEvent};

use crate::buffer::EditBuffer;

/// What is being edited.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EditTarget {
    TreeNode(String),
    Floating(String),
}

impl EditTarget {
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::TreeNode(id) | Self::Floating(id) => id,
        }
    }
}

/// Observable mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditMode {
    Idle,
    EditingTreeNode,
    EditingFloatingNode,
}

/// Result of routing a key to an active edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditKeyOutcome {
    /// Enter: commit the edit.
    Commit,
    /// Escape: discard the edit.
    Cancel,
    /// The buffer changed or moved its cursor.
    Edited,
    /// Consumed without effect.
    Ignored,
}

/// How an edit ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Commit,
    Cancel,
}

/// A finished edit, handed back to the session to apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishedEdit {
    pub target: EditTarget,
    /// Label as stored before the edit began.
    pub original: String,
    /// Plain text in the editor at the end.
    pub text: String,
    pub resolution: Resolution,
}

#[derive(Debug, Clone)]
struct ActiveEdit {
    target: EditTarget,
    original: String,
    buffer: EditBuffer,
}

/// Single global edit-mode owner.
#[derive(Debug, Clone, Default)]
pub struct EditArbiter {
    active: Option<ActiveEdit>,
}

impl EditArbiter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn mode(&self) -> EditMode {
        match self.active.as_ref().map(|a| &a.target) {
            None => EditMode::Idle,
            Some(EditTarget::TreeNode(_)) => EditMode::EditingTreeNode,
            Some(EditTarget::Floating(_)) => EditMode::EditingFloatingNode,
        }
    }

    #[must_use]
    pub fn is_editing(&self) -> bool {
        self.active.is_some()
    }

    #[must_use]
    pub fn target(&self) -> Option<&EditTarget> {
        self.active.as_ref().map(|a| &a.target)
    }

    /// Current editor text.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.buffer.value())
    }

    /// Enter edit mode with `text` fully selected.
    ///
    /// Returns `false` (and changes nothing) if an edit is already active.
    pub fn begin(&mut self, target: EditTarget, original: String, text: String) -> bool {
        if let Some(active) = &self.active {
            tracing::debug!(
                active = active.target.id(),
                requested = target.id(),
                "edit entry refused; another edit is active"
            );
            return false;
        }
        tracing::debug!(node_id = target.id(), "edit started");
        self.active = Some(ActiveEdit {
            target,
            original,
            buffer: EditBuffer::selecting_all(text),
        });
        true
    }

    /// Route a key to the active edit.
    pub fn handle_key(&mut self, key: &KeyEvent) -> EditKeyOutcome {
        let Some(active) = self.active.as_mut() else {
            return EditKeyOutcome::Ignored;
        };
        if !key.is_press() {
            return EditKeyOutcome::Ignored;
        }
        match key.code {
            KeyCode::Enter if key.shift() => {
                active.buffer.insert_text("\n");
                EditKeyOutcome::Edited
            }
            KeyCode::Enter => EditKeyOutcome::Commit,
            KeyCode::Escape => EditKeyOutcome::Cancel,
            _ if active.buffer.handle_key(key) => EditKeyOutcome::Edited,
            _ => EditKeyOutcome::Ignored,
        }
    }

    /// Insert pasted text into the active edit.
    pub fn insert_text(&mut self, text: &str) -> bool {
        match self.active.as_mut() {
            Some(active) => {
                active.buffer.insert_text(text);
                true
            }
            None => false,
        }
    }

    /// Leave edit mode. Always returns the arbiter to idle.
    pub fn finish(&mut self, resolution: Resolution) -> Option<FinishedEdit> {
        let active = self.active.take()?;
        tracing::debug!(node_id = active.target.id(), ?resolution, "edit finished");
        Some(FinishedEdit {
            target: active.target,
            original: active.original,
            text: active.buffer.value().to_string(),
            resolution,
        })
    }
}
