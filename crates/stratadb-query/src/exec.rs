//! Plan execution: range scans, residual filtering, sort stages.

use std::collections::HashSet;
use std::ops::Bound;

use stratadb_core::encoding::keys;
use stratadb_core::FieldValue;
use stratadb_index::document::Document;
use stratadb_index::metadata::CollectionIndexes;
use stratadb_index::walker::{walk, LeafValue};
use stratadb_index::IndexerConfig;
use stratadb_storage::{KvTransaction, RangeScan};

use crate::error::{QueryError, QueryResult};
use crate::filter::matches;
use crate::plan::{KeyRange, QueryPlan, ReadType, SortKey, SortOrder};

/// One query result: the primary-key tuple and the document.
pub type ResultRow = (Vec<FieldValue>, Document);

/// Execute a compiled plan in the caller's transaction.
///
/// Index scans yield rows in key order (value, then primary key), reversed
/// when the plan pushed a descending sort down; an in-memory sort stage runs
/// afterwards when the plan asked for one.
///
/// # Errors
///
/// Returns [`QueryError::Corruption`] if an index entry points at a missing
/// document, plus any storage or codec failure.
pub fn execute<T: KvTransaction>(
    txn: &T,
    coll: &CollectionIndexes,
    config: &IndexerConfig,
    plan: &QueryPlan,
) -> QueryResult<Vec<ResultRow>> {
    let mut rows = match plan.read_type {
        ReadType::SecondaryIndex => scan_indexes(txn, coll, config, plan)?,
        ReadType::Primary => scan_primary(txn, coll, plan)?,
    };
    if let Some(sort) = &plan.memory_sort {
        sort_rows(coll, &mut rows, sort);
    }
    Ok(rows)
}

fn scan_indexes<T: KvTransaction>(
    txn: &T,
    coll: &CollectionIndexes,
    config: &IndexerConfig,
    plan: &QueryPlan,
) -> QueryResult<Vec<ResultRow>> {
    let mut rows = Vec::new();
    let mut seen: HashSet<Vec<u8>> = HashSet::new();

    for scan in &plan.scans {
        let (low, high) = scan_bounds(coll, config, &scan.field, &scan.range)?;
        let mut entries = txn.range_scan(
            &coll.index_table,
            bound_ref(&low),
            bound_ref(&high),
            plan.reverse,
        )?;

        while let Some((entry_key, _)) = entries.next()? {
            let primary_key = keys::primary_key_of(&entry_key)?;
            let data_key = keys::encode_primary_key(&primary_key)?;
            if !seen.insert(data_key.clone()) {
                continue;
            }
            let doc_bytes = txn.get(&coll.data_table, &data_key)?.ok_or_else(|| {
                QueryError::Corruption(format!(
                    "index entry for missing document in {}",
                    coll.data_table
                ))
            })?;
            let doc = Document::from_bytes(&doc_bytes)?;
            if residual_ok(plan, coll, &doc) {
                rows.push((primary_key, doc));
            }
        }
    }
    Ok(rows)
}

fn scan_primary<T: KvTransaction>(
    txn: &T,
    coll: &CollectionIndexes,
    plan: &QueryPlan,
) -> QueryResult<Vec<ResultRow>> {
    let mut rows = Vec::new();
    let mut entries =
        txn.range_scan(&coll.data_table, Bound::Unbounded, Bound::Unbounded, false)?;
    while let Some((key, value)) = entries.next()? {
        let primary_key = keys::decode_primary_key(&key)?;
        let doc = Document::from_bytes(&value)?;
        if residual_ok(plan, coll, &doc) {
            rows.push((primary_key, doc));
        }
    }
    Ok(rows)
}

fn residual_ok(plan: &QueryPlan, coll: &CollectionIndexes, doc: &Document) -> bool {
    plan.residual
        .as_ref()
        .map_or(true, |filter| matches(filter, &coll.schema, doc))
}

/// Compile a plan-level range into byte bounds over the index table.
fn scan_bounds(
    coll: &CollectionIndexes,
    config: &IndexerConfig,
    field: &str,
    range: &KeyRange,
) -> QueryResult<(Bound<Vec<u8>>, Bound<Vec<u8>>)> {
    let table = coll.index_table.as_bytes();
    match range {
        KeyRange::Eq(value) => {
            let prefix =
                keys::value_prefix(table, field, value, config.string_key_max_bytes)?;
            let end = keys::increment_prefix(&prefix);
            Ok((Bound::Included(prefix), Bound::Excluded(end)))
        }
        KeyRange::Range { low, high } => {
            let field_prefix = keys::field_prefix(table, field);
            let low_bytes = match low {
                // Open low end: start at the field's null entries.
                None => Bound::Included(field_prefix.clone()),
                Some((value, inclusive)) => {
                    let prefix =
                        keys::value_prefix(table, field, value, config.string_key_max_bytes)?;
                    if *inclusive {
                        Bound::Included(prefix)
                    } else {
                        // Skip every entry carrying the bound value itself.
                        Bound::Included(keys::increment_prefix(&prefix))
                    }
                }
            };
            let high_bytes = match high {
                // Open high end: run to the end of the field subspace.
                None => Bound::Excluded(keys::increment_prefix(&field_prefix)),
                Some((value, inclusive)) => {
                    let prefix =
                        keys::value_prefix(table, field, value, config.string_key_max_bytes)?;
                    if *inclusive {
                        Bound::Excluded(keys::increment_prefix(&prefix))
                    } else {
                        Bound::Excluded(prefix)
                    }
                }
            };
            Ok((low_bytes, high_bytes))
        }
    }
}

fn bound_ref(bound: &Bound<Vec<u8>>) -> Bound<&[u8]> {
    match bound {
        Bound::Included(v) => Bound::Included(v.as_slice()),
        Bound::Excluded(v) => Bound::Excluded(v.as_slice()),
        Bound::Unbounded => Bound::Unbounded,
    }
}

fn sort_rows(coll: &CollectionIndexes, rows: &mut [ResultRow], sort: &[SortKey]) {
    rows.sort_by(|a, b| {
        for key in sort {
            let va = sort_value(coll, &a.1, &key.field);
            let vb = sort_value(coll, &b.1, &key.field);
            let mut ordering = va.cmp_semantic(&vb);
            if key.order == SortOrder::Desc {
                ordering = ordering.reverse();
            }
            if ordering != std::cmp::Ordering::Equal {
                return ordering;
            }
        }
        std::cmp::Ordering::Equal
    });
}

/// First walker leaf at the sort field; absent fields sort as null.
fn sort_value(coll: &CollectionIndexes, doc: &Document, field: &str) -> FieldValue {
    walk(&coll.schema, doc)
        .flatten()
        .find(|leaf| leaf.path == field)
        .and_then(|leaf| match leaf.value {
            LeafValue::Scalar(value) => Some(value),
            LeafValue::ArrayStub => None,
        })
        .unwrap_or(FieldValue::Null)
}
