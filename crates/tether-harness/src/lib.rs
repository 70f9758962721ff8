#![forbid(unsafe_code)]

//! Test collaborators for Tether sessions.
//!
//! - [`MemoryTree`]: a complete `node_tree` tree held in memory.
//! - [`FixedLayout`]: deterministic geometry with explicit node rects.
//! - [`RecordingPersistence`] / [`RecordingHost`]: capture outbound traffic.
//! - [`capture`]: collect `tracing` events emitted while a closure runs.
//! - [`fixture`]: a sample map with matching geometry.

pub mod capture;
pub mod fixture;
pub mod layout;
pub mod recorders;
pub mod tree;

pub use capture::{CapturedEvent, with_log_capture};
pub use fixture::{SAMPLE_MAP, sample_layout};
pub use layout::{FixedLayout, FloatingElement};
pub use recorders::{RecordingHost, RecordingPersistence};
pub use tree::MemoryTree;
