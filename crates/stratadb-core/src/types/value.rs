//! Scalar leaf values produced by walking a schema-typed document.
//!
//! This module provides the [`FieldValue`] enum, the typed representation of
//! a single document leaf. The field walker projects a JSON document onto a
//! stream of these values guided by the collection schema; the codec encodes
//! them into the order-preserving index key format.
//!
//! # Example
//!
//! ```
//! use stratadb_core::FieldValue;
//!
//! let name: FieldValue = "Alice".into();
//! let age: FieldValue = 30i64.into();
//! let score: FieldValue = 95.5f64.into();
//!
//! assert_eq!(name.as_str(), Some("Alice"));
//! assert_eq!(age.as_int(), Some(30));
//! assert_eq!(score.as_double(), Some(95.5));
//! ```

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::encoding::collation::collation_key_unbounded;

/// A scalar value at a document leaf.
///
/// The variant set is exactly the set of types the order-preserving codec can
/// place in an index key. Arrays and objects never appear here: the walker
/// flattens them into per-element leaves (or a synthetic array stub).
///
/// Datetimes are carried as their RFC-3339 text. A well-formed value is
/// canonicalised to UTC before it reaches this type; a malformed one is kept
/// verbatim and ordered as an opaque string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    /// Null or missing value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit floating point number.
    Double(f64),
    /// RFC-3339 datetime text.
    DateTime(String),
    /// UTF-8 string.
    String(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
}

impl FieldValue {
    /// Returns the boolean value, if this is a `Bool`.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the integer value, if this is an `Int`.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the double value, if this is a `Double`.
    #[must_use]
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Self::Double(f) => Some(*f),
            _ => None,
        }
    }

    /// Returns the string slice, if this is a `String`.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns `true` if this is the null value.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// A short name for the variant, used in error messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Double(_) => "double",
            Self::DateTime(_) => "datetime",
            Self::String(_) => "string",
            Self::Bytes(_) => "bytes",
        }
    }

    /// Rank in the cross-type order established by the codec's type tags.
    #[must_use]
    fn type_rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Bool(_) => 1,
            Self::Int(_) => 2,
            Self::Double(_) => 3,
            Self::DateTime(_) => 4,
            Self::String(_) => 5,
            Self::Bytes(_) => 6,
        }
    }

    /// Compares two values in the same order the encoded index keys sort.
    ///
    /// Values of different types order by type rank. Strings compare by their
    /// untruncated collation keys, so in-memory sorting and residual filters
    /// agree with index scans. NaN doubles are rejected upstream and compare
    /// equal to themselves here only to keep the ordering total.
    #[must_use]
    pub fn cmp_semantic(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Null, Self::Null) => Ordering::Equal,
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::Double(a), Self::Double(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (Self::DateTime(a), Self::DateTime(b)) => a.cmp(b),
            (Self::String(a), Self::String(b)) => {
                collation_key_unbounded(a).cmp(&collation_key_unbounded(b))
            }
            (Self::Bytes(a), Self::Bytes(b)) => a.cmp(b),
            _ => self.type_rank().cmp(&other.type_rank()),
        }
    }

    /// Equality in index-key terms: same as [`cmp_semantic`](Self::cmp_semantic)
    /// returning `Equal`, which for strings means collation equality.
    #[must_use]
    pub fn eq_semantic(&self, other: &Self) -> bool {
        self.cmp_semantic(other) == Ordering::Equal
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for FieldValue {
    fn from(f: f64) -> Self {
        Self::Double(f)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<Vec<u8>> for FieldValue {
    fn from(b: Vec<u8>) -> Self {
        Self::Bytes(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_accessors() {
        assert_eq!(FieldValue::Bool(true).as_bool(), Some(true));
        assert_eq!(FieldValue::Int(7).as_int(), Some(7));
        assert_eq!(FieldValue::Double(1.5).as_double(), Some(1.5));
        assert_eq!(FieldValue::from("x").as_str(), Some("x"));
        assert_eq!(FieldValue::Int(7).as_bool(), None);
        assert!(FieldValue::Null.is_null());
    }

    #[test]
    fn cross_type_order() {
        let ordered = [
            FieldValue::Null,
            FieldValue::Bool(true),
            FieldValue::Int(i64::MAX),
            FieldValue::Double(f64::MIN),
            FieldValue::DateTime("2023-01-01T00:00:00Z".to_owned()),
            FieldValue::String(String::new()),
            FieldValue::Bytes(vec![]),
        ];
        for pair in ordered.windows(2) {
            assert_eq!(pair[0].cmp_semantic(&pair[1]), Ordering::Less);
        }
    }

    #[test]
    fn string_compare_is_case_insensitive_first() {
        let a = FieldValue::from("a");
        let b = FieldValue::from("B");
        assert_eq!(a.cmp_semantic(&b), Ordering::Less);

        let g = FieldValue::from("G");
        let k = FieldValue::from("k");
        assert_eq!(g.cmp_semantic(&k), Ordering::Less);
    }
}
