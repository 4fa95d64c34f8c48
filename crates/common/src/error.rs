//! Error types shared across Shortsmith crates.

use std::path::PathBuf;

/// Top-level error type for Shortsmith operations.
#[derive(Debug, thiserror::Error)]
pub enum ShortsmithError {
    /// The scene description or request was malformed.
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// The scene could not be compiled into a filter program.
    #[error("Compile error: {message}")]
    Compile { message: String },

    /// The engine binary could not be launched.
    #[error("Engine unavailable: {message}")]
    EngineUnavailable { message: String },

    /// The engine ran but exited unsuccessfully.
    #[error("Render error: {message}")]
    Render { message: String, details: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using ShortsmithError.
pub type ShortsmithResult<T> = Result<T, ShortsmithError>;

impl ShortsmithError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    pub fn compile(msg: impl Into<String>) -> Self {
        Self::Compile {
            message: msg.into(),
        }
    }

    pub fn engine_unavailable(msg: impl Into<String>) -> Self {
        Self::EngineUnavailable {
            message: msg.into(),
        }
    }

    pub fn render(msg: impl Into<String>, details: impl Into<String>) -> Self {
        Self::Render {
            message: msg.into(),
            details: details.into(),
        }
    }

    /// Whether this error was caused by the caller's input rather than the server.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation { .. } | Self::Json(_))
    }
}
