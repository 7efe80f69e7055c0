//! Error types for HealthNav.
//!
//! Library crates use [`HealthNavError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all HealthNav operations.
#[derive(Debug, thiserror::Error)]
pub enum HealthNavError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Transport-level HTTP failure talking to an external service.
    #[error("network error: {0}")]
    Network(String),

    /// An external service answered, but with an error or an unusable payload.
    #[error("{service} error: {message}")]
    Provider {
        service: &'static str,
        message: String,
    },

    /// Structured output could not be decoded.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// A fatal pipeline stage failure (extract or plan).
    #[error("{stage} stage failed: {message}")]
    Stage {
        stage: &'static str,
        message: String,
    },

    /// A set-once pipeline field was written twice.
    #[error("pipeline field `{field}` is already set")]
    State { field: &'static str },

    /// HTTP server bind or serve failure.
    #[error("server error: {0}")]
    Server(String),

    /// Input or state validation error.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, HealthNavError>;

impl HealthNavError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a provider error for the named service.
    pub fn provider(service: &'static str, msg: impl Into<String>) -> Self {
        Self::Provider {
            service,
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a stage failure for the named pipeline stage.
    pub fn stage(stage: &'static str, msg: impl Into<String>) -> Self {
        Self::Stage {
            stage,
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
