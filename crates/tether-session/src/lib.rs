#![forbid(unsafe_code)]

//! Mind-map editing session.
//!
//! # Role in Tether
//! `tether-session` is the top of the stack. [`Session`] owns one open map
//! and turns input events into edits, navigation, drags, history steps and
//! persistence calls against the collaborators defined in `tether-core`.
//!
//! # Primary responsibilities
//! - **Edit arbitration** ([`arbiter`], [`buffer`]): one inline edit at a
//!   time, with a grapheme-aware text buffer.
//! - **Navigation** ([`navigation`], [`query`]): depth/side-aware arrow-key
//!   moves and eased scroll-to-center.
//! - **Floating nodes** ([`registry`], [`attach`]): untethered nodes,
//!   dragging, and attachment to the nearest tree node on drop.
//! - **Orchestration** ([`session`]): input routing, history snapshots,
//!   autosave, host commands, and status messages ([`status`]).

pub mod arbiter;
pub mod attach;
pub mod buffer;
pub mod error;
pub mod navigation;
pub mod query;
pub mod registry;
pub mod session;
pub mod status;

pub use arbiter::{EditMode, EditTarget};
pub use error::{Result, SessionError};
pub use navigation::Direction;
pub use registry::{FLOATING_ID_PREFIX, FloatingNode, FloatingRegistry};
pub use session::{NEW_CHILD_TOPIC, NEW_SIBLING_TOPIC, Session};
pub use status::StatusKind;
