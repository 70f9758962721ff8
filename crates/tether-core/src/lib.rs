#![forbid(unsafe_code)]

//! Core: geometry, input events, document model, and collaborator contracts.
//!
//! # Role in Tether
//! `tether-core` is the vocabulary layer. It owns the normalized input events
//! the session consumes, the serialized document shapes exchanged with the
//! host, and the traits that describe the tree widget, the render surface,
//! the persistence sink, and the host channel.
//!
//! # Primary responsibilities
//! - **Event**: canonical key, pointer, paste, and blur events.
//! - **Hotkey**: parsing and matching of configurable shortcut strings.
//! - **Document**: tree snapshots, floating node snapshots, and payloads.
//! - **Collaborators**: `TreeView`, `Layout`, `Persistence`, `HostChannel`.
//! - **Timing helpers**: a single-deadline debouncer and eased scrolling.
//!
//! # How it fits in the system
//! `tether-runtime` builds history and autosave scheduling on these types,
//! and `tether-session` wires everything into the editing session.

pub mod animation;
pub mod collab;
pub mod debounce;
pub mod document;
pub mod event;
pub mod geometry;
pub mod hotkey;
pub mod label;
