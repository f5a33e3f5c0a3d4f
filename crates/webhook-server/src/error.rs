//! Error types for the webhook server.

use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use database::DatabaseError;
use thiserror::Error;

/// Errors returned by request handlers.
///
/// Every variant renders as `{"success": false, "message": ...}`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Store error.
    #[error("{0}")]
    Database(#[from] DatabaseError),

    /// Requested order or assortment is absent.
    #[error("{0}")]
    NotFound(String),

    /// Malformed request.
    #[error("{0}")]
    BadRequest(String),

    /// Invalid domain value, e.g. an unknown image bucket.
    #[error("{0}")]
    Core(#[from] pcf_core::CoreError),

    /// Multipart body could not be read.
    #[error("invalid multipart request: {0}")]
    Multipart(#[from] MultipartError),

    /// Upload directory failure.
    #[error("upload storage error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Database(DatabaseError::NotFound { .. }) | ApiError::NotFound(_) => {
                StatusCode::NOT_FOUND
            }
            ApiError::Database(DatabaseError::Invalid { .. })
            | ApiError::BadRequest(_)
            | ApiError::Core(_)
            | ApiError::Multipart(_) => StatusCode::BAD_REQUEST,
            ApiError::Database(_) | ApiError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(status = %status, error = %self, "Request rejected");
        }

        let body = serde_json::json!({
            "success": false,
            "message": self.to_string(),
        });

        (status, Json(body)).into_response()
    }
}

/// Result type for handlers.
pub type Result<T> = std::result::Result<T, ApiError>;
