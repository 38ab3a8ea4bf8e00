//! Error types for feedpublish.
//!
//! Library crates use [`FeedPublishError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all feedpublish operations.
#[derive(Debug, thiserror::Error)]
pub enum FeedPublishError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error while pushing to a feed.
    #[error("network error: {0}")]
    Network(String),

    /// Manifest parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A single data validation error.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Several problems collected in one validation pass.
    #[error("{} problem(s) found:\n  - {}", problems.len(), problems.join("\n  - "))]
    Invalid { problems: Vec<String> },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, FeedPublishError>;

impl FeedPublishError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
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

    /// The individual problems carried by this error, one line each.
    pub fn problems(&self) -> Vec<String> {
        match self {
            Self::Invalid { problems } => problems.clone(),
            other => vec![other.to_string()],
        }
    }
}
