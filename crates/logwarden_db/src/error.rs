//! Error types for checkpoint persistence.

use thiserror::Error;

/// Checkpoint store result type.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Checkpoint store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLx error (connection, query, etc.)
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// IO error (creating the database directory)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// A stored row could not be decoded into a record
    #[error("Invalid checkpoint record: {0}")]
    InvalidRecord(String),
}

impl StoreError {
    /// Create a not found error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an invalid record error.
    pub fn invalid_record(msg: impl Into<String>) -> Self {
        Self::InvalidRecord(msg.into())
    }
}
