//! `StrataDB` Core
//!
//! This crate provides the fundamental types shared by the `StrataDB`
//! secondary-index subsystem.
//!
//! # Overview
//!
//! - **Values**: [`FieldValue`], the typed representation of a document leaf
//! - **Codec**: [`encoding::sortable`], the order-preserving scalar encoding,
//!   and [`encoding::collation`], the string collation keys
//! - **Keys**: [`encoding::keys`], composition and parsing of index key tuples
//! - **Errors**: [`CoreError`]
//!
//! # Example
//!
//! ```
//! use stratadb_core::encoding::keys;
//! use stratadb_core::FieldValue;
//!
//! let key = keys::encode_index_entry(
//!     b"sidx1",
//!     "age",
//!     &FieldValue::Int(30),
//!     0,
//!     1,
//!     &[FieldValue::Int(42)],
//!     64,
//! )
//! .unwrap();
//!
//! // A range scan over the field subspace yields primary keys directly.
//! assert_eq!(keys::primary_key_of(&key).unwrap(), vec![FieldValue::Int(42)]);
//! ```

pub mod encoding;
pub mod error;
pub mod types;

pub use error::{CoreError, CoreResult};
pub use types::FieldValue;
