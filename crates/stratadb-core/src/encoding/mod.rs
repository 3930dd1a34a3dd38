//! Order-preserving encodings for index keys.
//!
//! - [`sortable`] - type-tagged scalar encoding whose byte order matches
//!   semantic order
//! - [`collation`] - locale-insensitive collation keys for string values
//! - [`keys`] - composition and parsing of full index key tuples

pub mod collation;
pub mod keys;
pub mod sortable;

#[cfg(test)]
mod proptest_tests;

pub use keys::{KeyPart, ARRAY_STUB_FIELD, SECONDARY_SUBSPACE};
pub use sortable::DecodedScalar;
