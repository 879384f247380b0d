//! Error types for RegLens.
//!
//! Library crates use [`RegLensError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all RegLens operations.
#[derive(Debug, thiserror::Error)]
pub enum RegLensError {
    /// Configuration file could not be read, parsed, or validated.
    #[error("config error: {message}")]
    Config { message: String },

    /// A required setting is absent from the configuration.
    #[error("missing configuration key `{key}`")]
    ConfigurationMissing { key: String },

    /// A call to the reasoning collaborator failed or returned something unusable.
    #[error("external call failed: {0}")]
    ExternalCall(String),

    /// The embedding collaborator was unreachable or answered with a non-success status.
    #[error("embedding unavailable{}: {body}", status_suffix(.status))]
    EmbeddingUnavailable { status: Option<u16>, body: String },

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (dimension mismatch, invalid argument, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, RegLensError>;

impl RegLensError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a missing-key error.
    pub fn missing(key: impl Into<String>) -> Self {
        Self::ConfigurationMissing { key: key.into() }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create an embedding error without an HTTP status (transport failure, bad body).
    pub fn embedding(body: impl Into<String>) -> Self {
        Self::EmbeddingUnavailable {
            status: None,
            body: body.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
