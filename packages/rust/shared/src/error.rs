//! Error types for AmendWatch.
//!
//! Library crates use [`AmendWatchError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Malformed listing rows are tolerated silently by the extractor and
//! therefore have no variant here.

use std::path::PathBuf;

/// Top-level error type for all AmendWatch operations.
#[derive(Debug, thiserror::Error)]
pub enum AmendWatchError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Listing or bill detail page could not be fetched.
    #[error("transport error: {0}")]
    Transport(String),

    /// Scan or point lookup against the store failed.
    #[error("store read error: {0}")]
    StoreRead(String),

    /// Put or batch write against the store failed.
    #[error("store write error: {0}")]
    StoreWrite(String),

    /// Digest delivery failed.
    #[error("notify error: {0}")]
    Notify(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Invalid input (oversized batch, bad partition name, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, AmendWatchError>;

impl AmendWatchError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = AmendWatchError::config("missing origin");
        assert_eq!(err.to_string(), "config error: missing origin");

        let err = AmendWatchError::validation("batch of 26 exceeds limit of 25");
        assert!(err.to_string().contains("batch of 26"));

        let err = AmendWatchError::StoreRead("scan timed out".into());
        assert_eq!(err.to_string(), "store read error: scan timed out");
    }
}
