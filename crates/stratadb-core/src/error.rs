//! Error types for the core crate.

use thiserror::Error;

/// Errors that can occur in the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An encoding or decoding error occurred.
    #[error("codec error: {0}")]
    Codec(String),

    /// A value cannot be represented in the order-preserving encoding.
    #[error("unsupported value for indexing: {0}")]
    Unsupported(String),

    /// A value type mismatch occurred.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// The expected type.
        expected: String,
        /// The actual type.
        actual: String,
    },
}

impl CoreError {
    /// Creates a codec error from any displayable message.
    #[must_use]
    pub fn codec(msg: impl Into<String>) -> Self {
        Self::Codec(msg.into())
    }

    /// Creates a type mismatch error.
    #[must_use]
    pub fn type_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::TypeMismatch { expected: expected.into(), actual: actual.into() }
    }
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
