//! Top-level error type for collection operations.

use stratadb_core::CoreError;
use stratadb_index::IndexError;
use stratadb_query::QueryError;
use stratadb_storage::StorageError;
use thiserror::Error;

/// Errors surfaced by the collection facade.
#[derive(Debug, Error)]
pub enum DbError {
    /// A storage engine failure.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// An index maintenance failure.
    #[error("index error: {0}")]
    Index(#[from] IndexError),

    /// A query compilation or execution failure.
    #[error("query error: {0}")]
    Query(#[from] QueryError),

    /// A codec failure.
    #[error("codec error: {0}")]
    Codec(#[from] CoreError),

    /// A document with this primary key already exists.
    #[error("duplicate primary key: {0}")]
    DuplicateKey(String),

    /// The update document is malformed.
    #[error("invalid update: {0}")]
    InvalidUpdate(String),

    /// No index with the given name.
    #[error("index not found: {0}")]
    IndexNotFound(String),
}

/// Result type for collection operations.
pub type DbResult<T> = Result<T, DbError>;
