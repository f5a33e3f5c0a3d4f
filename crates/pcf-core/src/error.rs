//! Error types for assortment data handling.

use thiserror::Error;

/// Errors raised while interpreting assortment data.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Unknown image bucket name.
    #[error("unknown image bucket: {0}")]
    UnknownBucket(String),

    /// Unknown order status.
    #[error("unknown order status: {0}")]
    UnknownStatus(String),
}
