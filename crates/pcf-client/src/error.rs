//! Error types for pcf-client.

use thiserror::Error;

/// Errors that can occur when talking to the webhook server or the caches.
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Server answered with a non-success status.
    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },

    /// Durable store I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Cache contents unusable.
    #[error("cache error: {0}")]
    Cache(String),
}

impl ClientError {
    /// Whether repeating the request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Http(err) => err.is_timeout() || err.is_connect() || err.is_request(),
            ClientError::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
