//! Error types for index maintenance.

use stratadb_core::CoreError;
use stratadb_storage::StorageError;
use thiserror::Error;

/// Errors that can occur while deriving or maintaining index entries.
#[derive(Debug, Error)]
pub enum IndexError {
    /// The order-preserving codec rejected a value (NaN, malformed part).
    #[error("codec error: {0}")]
    Codec(#[from] CoreError),

    /// A storage operation failed; conflicts and size overruns are
    /// recoverable by retrying in a fresh transaction.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// A document field disagrees with the schema. The indexer does not
    /// coerce.
    #[error("schema mismatch at {path}: expected {expected}, got {actual}")]
    SchemaMismatch {
        /// Dotted path of the offending field.
        path: String,
        /// The schema-declared type.
        expected: String,
        /// What the document actually holds.
        actual: String,
    },

    /// The schema itself is unusable.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    /// A stored document envelope could not be decoded.
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// No index metadata exists under the given name or id.
    #[error("index not found: {0}")]
    IndexNotFound(String),
}

impl IndexError {
    /// Creates a schema mismatch error.
    #[must_use]
    pub fn schema_mismatch(
        path: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::SchemaMismatch {
            path: path.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

/// Result type for index operations.
pub type IndexResult<T> = Result<T, IndexError>;
