#![forbid(unsafe_code)]

//! Runtime services for an editing session.
//!
//! - [`history`]: bounded snapshot history with a cursor and redo pruning.
//! - [`autosave`]: debounced flush scheduling and changed-node tracking.
//! - [`config`]: session configuration with TOML/JSON loading and validation.

pub mod autosave;
pub mod config;
pub mod history;

pub use autosave::{AutosaveConfig, AutosaveScheduler, SaveTrigger};
pub use config::{ConfigError, HotkeyAction, HotkeyConfig, SessionConfig};
pub use history::{History, HistoryConfig, PushOutcome};
