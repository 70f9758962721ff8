#![forbid(unsafe_code)]

//! Error types for the editing session.

use tether_core::collab::TreeImportError;
use tether_core::document::PayloadError;
use tether_runtime::ConfigError;
use thiserror::Error;

/// Result type used throughout the session.
pub type Result<T> = std::result::Result<T, SessionError>;

/// Failures the session reports to its caller.
///
/// Precondition misses (editing while already editing, navigating without a
/// selection, attaching with no drag) are not errors; the corresponding
/// operations return `false` or `None`.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to decode document payload: {0}")]
    Payload(#[from] PayloadError),

    #[error("failed to encode persistence payload: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    TreeImport(#[from] TreeImportError),

    #[error("invalid session configuration: {0}")]
    Config(#[from] ConfigError),
}

impl SessionError {
    /// Text shown in a blocking alert.
    #[must_use]
    pub fn alert_text(&self, context: &str) -> String {
        format!("{context}: {self}")
    }
}
