//! Storage error types.

use thiserror::Error;

/// Errors surfaced by the KV engine abstraction.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error from the underlying medium.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A backend-specific failure opening or operating the database.
    #[error("backend error: {0}")]
    Backend(String),

    /// A transaction could not be started, committed, or rolled back.
    #[error("transaction error: {0}")]
    Transaction(String),

    /// A conflict with a concurrent transaction; the caller may retry.
    #[error("transaction conflict: {0}")]
    Conflict(String),

    /// The transaction exceeded the engine's size ceiling; the caller may
    /// retry with smaller batches.
    #[error("transaction too large: {0}")]
    TooLarge(String),

    /// The operation was cancelled before completion.
    #[error("operation cancelled")]
    Cancelled,

    /// A write was attempted on a read-only transaction.
    #[error("cannot write in read-only transaction")]
    ReadOnly,

    /// Stored bytes could not be interpreted.
    #[error("corrupted data: {0}")]
    Corruption(String),
}

impl StorageError {
    /// Returns `true` if the operation may succeed when retried in a fresh
    /// transaction.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Conflict(_) | Self::TooLarge(_))
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

impl From<redb::DatabaseError> for StorageError {
    fn from(err: redb::DatabaseError) -> Self {
        Self::Backend(err.to_string())
    }
}

impl From<redb::TransactionError> for StorageError {
    fn from(err: redb::TransactionError) -> Self {
        Self::Transaction(err.to_string())
    }
}

impl From<redb::TableError> for StorageError {
    fn from(err: redb::TableError) -> Self {
        Self::Backend(err.to_string())
    }
}

impl From<redb::StorageError> for StorageError {
    fn from(err: redb::StorageError) -> Self {
        Self::Backend(err.to_string())
    }
}

impl From<redb::CommitError> for StorageError {
    fn from(err: redb::CommitError) -> Self {
        Self::Transaction(err.to_string())
    }
}
