//! Query plans and their human-readable EXPLAIN form.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use stratadb_core::FieldValue;

use crate::filter::FilterNode;

/// Human sentinel for the open low end of a key range.
pub const NULL_SENTINEL: &str = "null";
/// Human sentinel for the open high end of a key range.
pub const MAX_SENTINEL: &str = "$TIGRIS_MAX";

/// How a plan reads the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadType {
    /// Range scans over secondary index entries.
    SecondaryIndex,
    /// Full scan of the primary data subspace.
    Primary,
}

impl ReadType {
    /// Wire representation used by EXPLAIN.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SecondaryIndex => "secondary index",
            Self::Primary => "primary",
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Ascending.
    Asc,
    /// Descending.
    Desc,
}

/// One sort key.
#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    /// Field to sort by.
    pub field: String,
    /// Direction.
    pub order: SortOrder,
}

/// Key range of one index scan, at plan level (semantic values, not bytes).
#[derive(Debug, Clone, PartialEq)]
pub enum KeyRange {
    /// Exactly one value.
    Eq(FieldValue),
    /// `[low, high]` with per-end inclusivity; `None` ends are open: the low
    /// end starts at the field's null entries, the high end runs to the
    /// field subspace end.
    Range {
        /// Lower bound and inclusivity.
        low: Option<(FieldValue, bool)>,
        /// Upper bound and inclusivity.
        high: Option<(FieldValue, bool)>,
    },
}

/// One index scan: a field and the key range over it.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexScan {
    /// Field whose index subspace is scanned.
    pub field: String,
    /// The range.
    pub range: KeyRange,
}

/// A compiled query plan.
#[derive(Debug, Clone)]
pub struct QueryPlan {
    /// How the collection is read.
    pub read_type: ReadType,
    /// Index scans, in execution order; empty for a primary scan.
    pub scans: Vec<IndexScan>,
    /// Post-scan filter removing false positives and uncovered predicates.
    pub residual: Option<FilterNode>,
    /// Scan direction (descending when a pushed-down sort asks for it).
    pub reverse: bool,
    /// In-memory sort stage when the sort was not pushed down.
    pub memory_sort: Option<Vec<SortKey>>,
}

impl QueryPlan {
    /// A full primary scan with the given residual filter.
    #[must_use]
    pub fn primary(residual: Option<FilterNode>, memory_sort: Option<Vec<SortKey>>) -> Self {
        Self {
            read_type: ReadType::Primary,
            scans: Vec::new(),
            residual,
            reverse: false,
            memory_sort,
        }
    }

    /// The EXPLAIN view of this plan.
    #[must_use]
    pub fn explain(&self) -> Explain {
        let (field, key_range) = match self.scans.first() {
            Some(scan) => (scan.field.clone(), render_range(&scan.range)),
            None => (String::new(), Vec::new()),
        };
        Explain { read_type: self.read_type.as_str().to_owned(), field, key_range }
    }
}

/// Read-only query introspection: how the query would execute.
#[derive(Debug, Clone, PartialEq)]
pub struct Explain {
    /// `"secondary index"` or `"primary"`.
    pub read_type: String,
    /// The chosen index field, empty on a primary scan.
    pub field: String,
    /// `[value]` for equality, `[low, high]` for ranges, with the
    /// [`NULL_SENTINEL`]/[`MAX_SENTINEL`] placeholders at open ends.
    pub key_range: Vec<String>,
}

fn render_range(range: &KeyRange) -> Vec<String> {
    match range {
        KeyRange::Eq(value) => vec![render_value(value)],
        KeyRange::Range { low, high } => vec![
            low.as_ref().map_or_else(|| NULL_SENTINEL.to_owned(), |(v, _)| render_value(v)),
            high.as_ref().map_or_else(|| MAX_SENTINEL.to_owned(), |(v, _)| render_value(v)),
        ],
    }
}

/// Human rendering of one bound value.
#[must_use]
pub fn render_value(value: &FieldValue) -> String {
    match value {
        FieldValue::Null => NULL_SENTINEL.to_owned(),
        FieldValue::Bool(b) => b.to_string(),
        FieldValue::Int(i) => i.to_string(),
        FieldValue::Double(f) => f.to_string(),
        FieldValue::DateTime(s) | FieldValue::String(s) => s.clone(),
        FieldValue::Bytes(b) => BASE64.encode(b),
    }
}
