//! Response bodies and the API error type.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use shortsmith_common::error::ShortsmithError;

/// Maximum characters of engine diagnostics returned to callers.
pub const DETAILS_TAIL_CHARS: usize = 1000;

pub type ApiResult<T> = Result<T, ApiError>;

/// Successful export body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportResponse {
    pub url: String,
    pub size: u64,
    pub duration: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitles: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a str>,
}

/// Errors surfaced by the HTTP handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal { error: String, details: String },
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn internal(error: impl Into<String>, details: impl AsRef<str>) -> Self {
        Self::Internal {
            error: error.into(),
            details: tail(details.as_ref(), DETAILS_TAIL_CHARS).to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ShortsmithError> for ApiError {
    fn from(err: ShortsmithError) -> Self {
        if err.is_client_error() {
            return Self::BadRequest(err.to_string());
        }
        match err {
            ShortsmithError::Render { message, details } => Self::internal(message, details),
            ShortsmithError::EngineUnavailable { message } => {
                Self::internal("Video engine is unavailable", message)
            }
            ShortsmithError::Compile { message } => {
                tracing::error!(error = %message, "Scene compilation failed");
                Self::internal("Failed to build render instructions", "")
            }
            other => Self::internal("Export failed", other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::BadRequest(error) | Self::NotFound(error) => ErrorBody {
                error,
                details: None,
            },
            Self::Internal { error, details } => ErrorBody {
                error,
                details: Some(details),
            },
        };
        (status, Json(body)).into_response()
    }
}

/// Last `max_chars` characters of `text`.
pub fn tail(text: &str, max_chars: usize) -> &str {
    let count = text.chars().count();
    if count <= max_chars {
        return text;
    }
    let skip = count - max_chars;
    match text.char_indices().nth(skip) {
        Some((at, _)) => &text[at..],
        None => "",
    }
}
