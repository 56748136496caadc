use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::constants::ERR_BLOB_NOT_FOUND;
use crate::db::StoreError;
use crate::storage::BlobError;

/// Application error type
///
/// Every multi-step operation reports the error of the step that first failed.
/// Failures of best-effort steps never become an `AppError`.
#[derive(Error, Debug)]
pub enum AppError {
    /// Absent, invalid, expired or mismatched credentials
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Blob store or metadata store unreachable or failing
    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Map a metadata store error, naming the missing entity on `NotFound`
    pub fn from_store(err: StoreError, not_found: &str) -> Self {
        match err {
            StoreError::NotFound => AppError::NotFound(not_found.to_string()),
            StoreError::Conflict(msg) => AppError::Conflict(msg),
            StoreError::Invalid(msg) => AppError::InvalidInput(msg),
            StoreError::Unavailable(msg) => AppError::Upstream(msg),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::from_store(err, "Resource not found")
    }
}

impl From<BlobError> for AppError {
    fn from(err: BlobError) -> Self {
        match err {
            BlobError::NotFound { .. } => AppError::NotFound(ERR_BLOB_NOT_FOUND.to_string()),
            BlobError::Invalid(msg) => AppError::InvalidInput(msg),
            BlobError::Unavailable(msg) => AppError::Upstream(msg),
        }
    }
}

/// Implement IntoResponse to convert AppError into HTTP responses
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Upstream(ref e) => {
                tracing::error!("Upstream store error: {}", e);
                (StatusCode::BAD_GATEWAY, "Upstream storage unavailable".to_string())
            }
            AppError::Internal(ref e) => {
                tracing::error!("Internal error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message
        }));

        (status, body).into_response()
    }
}

/// Result type alias for application results
pub type Result<T> = std::result::Result<T, AppError>;
