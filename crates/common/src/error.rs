//! Common error types for znn-diag.

use thiserror::Error;

/// Common error type for diagnostic operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Command execution failed: {cmd} - {reason}")]
    CommandExecution { cmd: String, reason: String },

    #[error("Credential decryption failed: {0}")]
    Decryption(String),

    #[error("Required packages missing: {}", .0.join(", "))]
    MissingPackages(Vec<String>),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Upload error: {0}")]
    Upload(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias using common Error.
pub type Result<T> = std::result::Result<T, Error>;

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        Error::Other(e.to_string())
    }
}
