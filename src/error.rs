//! Centralized error types for inbox-harvest.

use std::path::PathBuf;
use thiserror::Error;

use crate::model::MessageId;

/// All errors produced by the inbox-harvest library.
///
/// Header-decoding problems are deliberately absent: malformed headers are
/// decoded best-effort and never surface as an error.
#[derive(Error, Debug)]
pub enum HarvestError {
    /// A required credential, host or port is missing or invalid.
    /// Raised before any network I/O.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The TLS connection could not be established, or the transport failed
    /// while the session was in use.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The server rejected the login.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The server answered the SEARCH command with a non-OK status.
    #[error("Search failed: {response}")]
    Search { response: String },

    /// The server answered FETCH for one message with a non-OK status,
    /// or returned no message body.
    #[error("Failed to fetch message {id}: {reason}")]
    Fetch { id: MessageId, reason: String },

    /// The output directory could not be created or an attachment could not
    /// be written.
    #[error("Failed to write attachment '{path}': {source}")]
    AttachmentWrite {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias for `Result<T, HarvestError>`.
pub type Result<T> = std::result::Result<T, HarvestError>;

impl HarvestError {
    /// Create an `AttachmentWrite` variant from a path and an `io::Error`.
    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::AttachmentWrite {
            path: path.into(),
            source,
        }
    }
}
