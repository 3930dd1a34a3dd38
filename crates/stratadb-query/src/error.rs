//! Error types for query planning and execution.

use stratadb_core::CoreError;
use stratadb_index::IndexError;
use stratadb_storage::StorageError;
use thiserror::Error;

/// Errors that can occur while compiling or running a query.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The order-preserving codec rejected a bound value.
    #[error("codec error: {0}")]
    Codec(#[from] CoreError),

    /// A storage operation failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// An index-layer failure (schema mismatch, bad document).
    #[error("index error: {0}")]
    Index(#[from] IndexError),

    /// The filter document is malformed.
    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    /// A filter or sort references a field the schema does not declare.
    #[error("unknown field: {0}")]
    UnknownField(String),

    /// The sort document is malformed.
    #[error("invalid sort: {0}")]
    InvalidSort(String),

    /// An index entry references a document that does not exist; the entry
    /// set and the data subspace disagree.
    #[error("index corruption: {0}")]
    Corruption(String),
}

/// Result type for query operations.
pub type QueryResult<T> = Result<T, QueryError>;
