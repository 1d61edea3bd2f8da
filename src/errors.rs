use crate::services::storage_service::StorageError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// An API error carrying the HTTP status, a machine-readable code and a
/// human message.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status, code and message.
    pub fn new(status: StatusCode, code: &'static str, msg: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: msg.into(),
        }
    }

    /// Shortcut for a 400 Bad Request
    pub fn bad_request(code: &'static str, msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, msg)
    }

    /// Shortcut for a 404 Not Found
    pub fn not_found(code: &'static str, msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, code, msg)
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(code: &'static str, msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, code, msg)
    }

    /// Map a storage error onto its API code.
    ///
    /// Validation and lookup failures have fixed codes. Anything else is a
    /// 500 reported under `fallback_code`, prefixed with `context`.
    pub fn from_storage(err: StorageError, fallback_code: &'static str, context: &str) -> Self {
        match err {
            StorageError::EmptyFilename => Self::bad_request("EMPTY_FILENAME", err.to_string()),
            StorageError::InvalidFileType { .. } => {
                Self::bad_request("INVALID_FILE_TYPE", err.to_string())
            }
            StorageError::EmptyPath => Self::bad_request("EMPTY_PATH", err.to_string()),
            StorageError::InvalidPath(_) => Self::bad_request("INVALID_PATH", err.to_string()),
            StorageError::PathNotFound(_) => Self::not_found("PATH_NOT_FOUND", err.to_string()),
            StorageError::FileNotFound(_) => Self::not_found("FILE_NOT_FOUND", err.to_string()),
            StorageError::CollisionExhausted(_) | StorageError::Io(_) => {
                Self::internal(fallback_code, format!("{}: {}", context, err))
            }
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(code = self.code, "{}", self.message);
        }

        let body = Json(json!({
            "success": false,
            "error": self.message,
            "code": self.code,
        }));

        (self.status, body).into_response()
    }
}
