//! Database error types.

use thiserror::Error;

/// Errors that can occur during database operations.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// SQLx error (connection, query, etc.)
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Migration error
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Stored JSON could not be encoded or decoded
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Record not found
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Input rejected before reaching the database
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    /// Stored data failed to parse
    #[error("corrupt data: {0}")]
    Core(#[from] pcf_core::CoreError),
}

/// Result type for database operations.
pub type Result<T> = std::result::Result<T, DatabaseError>;
