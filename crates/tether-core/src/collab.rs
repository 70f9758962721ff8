#![forbid(unsafe_code)]

//! Contracts for the collaborators an editing session drives.
//!
//! The session never touches rendering, storage, or the host directly. It
//! talks to four collaborators:
//!
//! - [`TreeView`]: the tree widget. Owns node storage, parent/child links,
//!   and tree selection. Reports every mutation through a change channel.
//! - [`Layout`]: the render surface. Answers geometry questions in screen
//!   space, owns scroll/zoom, and hosts floating-node elements.
//! - [`Persistence`]: a fire-and-forget sink for serialized payloads.
//! - [`HostChannel`]: outbound commands and blocking alerts.
//!
//! All methods are synchronous; the host is expected to run the session on
//! one thread (the UI thread).

use std::sync::mpsc;

use crate::document::TreeSnapshot;
use crate::geometry::{Point, Rect};

// ============================================================================
// Tree
// ============================================================================

/// A node as reported by the tree collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    pub id: String,
    /// Stored label markup.
    pub topic: String,
    /// Parent id; `None` only for the root.
    pub parent: Option<String>,
    /// Child ids in display order.
    pub children: Vec<String>,
    /// External link reference, if any.
    pub link_id: Option<String>,
}

impl TreeNode {
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// A mutation reported by the tree collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeChange {
    Added { id: String },
    Updated { id: String },
    Removed { id: String },
    Moved { id: String },
    /// The whole tree was replaced by `show`.
    Reloaded,
}

impl TreeChange {
    /// The node this change concerns, if it concerns a single node.
    #[must_use]
    pub fn node_id(&self) -> Option<&str> {
        match self {
            Self::Added { id } | Self::Updated { id } | Self::Removed { id } | Self::Moved { id } => {
                Some(id)
            }
            Self::Reloaded => None,
        }
    }
}

/// Error returned when the tree collaborator rejects a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeImportError {
    pub message: String,
}

impl TreeImportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for TreeImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tree import failed: {}", self.message)
    }
}

impl std::error::Error for TreeImportError {}

/// The tree widget.
///
/// Mutators return `false` when the operation is impossible (unknown id,
/// root removal, cycle); they never panic.
pub trait TreeView {
    /// Replace the whole tree.
    fn show(&mut self, snapshot: &TreeSnapshot) -> Result<(), TreeImportError>;

    /// Export the whole tree.
    fn export(&self) -> TreeSnapshot;

    fn add_node(&mut self, parent_id: &str, id: &str, topic: &str) -> bool;

    fn update_node(&mut self, id: &str, topic: &str) -> bool;

    fn remove_node(&mut self, id: &str) -> bool;

    fn move_node(&mut self, id: &str, new_parent_id: &str) -> bool;

    fn select_node(&mut self, id: &str) -> bool;

    fn clear_selection(&mut self);

    fn selected(&self) -> Option<TreeNode>;

    fn root(&self) -> Option<TreeNode>;

    fn node(&self, id: &str) -> Option<TreeNode>;

    /// `false` when the map is read-only.
    fn is_editable(&self) -> bool;

    /// Register a sink for mutation notifications.
    fn subscribe(&mut self, sink: mpsc::Sender<TreeChange>);
}

// ============================================================================
// Layout
// ============================================================================

/// Opaque handle to a floating-node element hosted by the layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementHandle(pub u64);

/// A rendered element the session can refer to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ElementRef {
    TreeNode(String),
    Floating(ElementHandle),
}

/// The render surface.
///
/// Rects are screen space. Floating positions and the scroll offset are
/// canvas space: pixels on the unzoomed, unscrolled map surface. A canvas
/// point `c` is drawn at `viewport.origin + (c - scroll_offset) * zoom`.
pub trait Layout {
    /// Bounds of a rendered tree node.
    fn node_rect(&self, id: &str) -> Option<Rect>;

    /// Bounds of a mounted floating element.
    fn floating_rect(&self, handle: ElementHandle) -> Option<Rect>;

    /// Screen-space bounds of the scrollable panel.
    fn viewport(&self) -> Rect;

    fn zoom(&self) -> f64;

    /// Canvas point drawn at the viewport's top-left corner.
    fn scroll_offset(&self) -> Point;

    /// Set the canvas-space scroll offset.
    fn set_scroll_offset(&mut self, offset: Point);

    /// Jump (without animation) so that the node is centered.
    fn center_on(&mut self, id: &str);

    /// Topmost element under a screen point.
    fn hit_test(&self, point: Point) -> Option<ElementRef>;

    /// Rendered markup of the whole map, forwarded verbatim in payloads.
    fn rendered_html(&self) -> String;

    fn mount_floating(&mut self, id: &str, label: &str, position: Point) -> ElementHandle;

    fn unmount_floating(&mut self, handle: ElementHandle);

    fn place_floating(&mut self, handle: ElementHandle, position: Point);

    fn set_floating_label(&mut self, handle: ElementHandle, label: &str);

    /// Toggle the attach-target highlight.
    fn set_highlight(&mut self, target: &ElementRef, on: bool);

    /// Toggle the "has external link" marker on a tree node.
    fn mark_linked(&mut self, id: &str, linked: bool);

    /// Make `target` editable, showing `text`.
    fn open_editor(&mut self, target: &ElementRef, text: &str);

    /// Mirror the current editor text.
    fn sync_editor(&mut self, text: &str);

    fn close_editor(&mut self);
}

// ============================================================================
// Persistence and host
// ============================================================================

/// Fire-and-forget payload sink.
pub trait Persistence {
    fn persist(&mut self, payload_json: &str);
}

/// Commands sent to the host application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCommand {
    Save,
    RefreshData,
    ToggleFullscreen,
    JumpToLinked { link_id: String },
}

/// Outbound host channel.
pub trait HostChannel {
    fn send(&mut self, command: HostCommand);

    /// Blocking, user-visible alert.
    fn alert(&mut self, message: &str);
}
