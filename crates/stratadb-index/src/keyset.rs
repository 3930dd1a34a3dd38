//! Key-set derivation and the add/remove delta between document revisions.

use std::collections::{HashMap, HashSet};

use stratadb_core::encoding::keys;
use stratadb_core::FieldValue;

use crate::config::IndexerConfig;
use crate::document::Document;
use crate::error::IndexResult;
use crate::metadata::{CollectionIndexes, IndexMeta};
use crate::walker::{walk, LeafValue};

/// One derived index entry: the encoded key plus the leaf path it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    /// Leaf path of the source value.
    pub path: String,
    /// Fully encoded index key.
    pub key: Vec<u8>,
}

/// The multiset of index keys derived from one document.
///
/// Keys are unique within a document: equal leaf values in one array differ
/// by `array_pos`, and the primary-key suffix disambiguates across documents.
/// Per-field occurrence counts exist for plan verification, not for storage.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct KeySet {
    /// Entries in walk order.
    pub entries: Vec<IndexEntry>,
}

impl KeySet {
    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Occurrences per leaf path.
    #[must_use]
    pub fn counts(&self) -> HashMap<String, i64> {
        counts_of(&self.entries)
    }
}

/// The index side effects of one document mutation.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct UpdateSet {
    /// Keys to write.
    pub add: Vec<IndexEntry>,
    /// Keys to clear.
    pub remove: Vec<IndexEntry>,
}

impl UpdateSet {
    /// Occurrences per leaf path among the added keys.
    #[must_use]
    pub fn add_counts(&self) -> HashMap<String, i64> {
        counts_of(&self.add)
    }

    /// Occurrences per leaf path among the removed keys.
    #[must_use]
    pub fn remove_counts(&self) -> HashMap<String, i64> {
        counts_of(&self.remove)
    }
}

fn counts_of(entries: &[IndexEntry]) -> HashMap<String, i64> {
    let mut counts = HashMap::new();
    for entry in entries {
        *counts.entry(entry.path.clone()).or_insert(0) += 1;
    }
    counts
}

/// Derive the key set of one document for the indexes `accept` admits.
///
/// Leaves whose top-level field carries no live index are skipped.
///
/// # Errors
///
/// Propagates walker schema mismatches and codec rejections.
pub fn build_key_set(
    coll: &CollectionIndexes,
    config: &IndexerConfig,
    doc: &Document,
    primary_key: &[FieldValue],
    accept: &dyn Fn(&IndexMeta) -> bool,
) -> IndexResult<KeySet> {
    let table = coll.index_table.as_bytes();
    let mut entries = Vec::new();
    for leaf in walk(&coll.schema, doc) {
        let leaf = leaf?;
        let Some(meta) = coll.meta_for_path(&leaf.path) else { continue };
        if !accept(meta) {
            continue;
        }
        let key = match &leaf.value {
            LeafValue::Scalar(value) => keys::encode_index_entry(
                table,
                &leaf.path,
                value,
                leaf.array_pos,
                meta.id,
                primary_key,
                config.string_key_max_bytes,
            )?,
            LeafValue::ArrayStub => keys::encode_stub_entry(
                table,
                &leaf.path,
                leaf.array_pos,
                meta.id,
                primary_key,
            )?,
        };
        entries.push(IndexEntry { path: leaf.path, key });
    }
    Ok(KeySet { entries })
}

/// Diff the key sets of two document revisions into an [`UpdateSet`].
///
/// `new_doc = Some, old_doc = None` is an insert (everything added),
/// `None / Some` a delete (everything removed), `Some / Some` an update
/// (common keys untouched).
///
/// # Errors
///
/// Propagates walker schema mismatches and codec rejections.
pub fn build_update_set(
    coll: &CollectionIndexes,
    config: &IndexerConfig,
    new_doc: Option<&Document>,
    old_doc: Option<&Document>,
    primary_key: &[FieldValue],
    accept: &dyn Fn(&IndexMeta) -> bool,
) -> IndexResult<UpdateSet> {
    let new_set = match new_doc {
        Some(doc) => build_key_set(coll, config, doc, primary_key, accept)?,
        None => KeySet::default(),
    };
    let old_set = match old_doc {
        Some(doc) => build_key_set(coll, config, doc, primary_key, accept)?,
        None => KeySet::default(),
    };

    let new_keys: HashSet<&[u8]> =
        new_set.entries.iter().map(|e| e.key.as_slice()).collect();
    let old_keys: HashSet<&[u8]> =
        old_set.entries.iter().map(|e| e.key.as_slice()).collect();

    let add = new_set
        .entries
        .iter()
        .filter(|e| !old_keys.contains(e.key.as_slice()))
        .cloned()
        .collect();
    let remove = old_set
        .entries
        .iter()
        .filter(|e| !new_keys.contains(e.key.as_slice()))
        .cloned()
        .collect();

    Ok(UpdateSet { add, remove })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::schema::CollectionSchema;

    const TS: &str = "2023-01-16T12:55:17.304154Z";

    fn setup() -> (CollectionIndexes, IndexerConfig) {
        let schema = CollectionSchema::from_json(
            br#"{
                "title": "t1",
                "properties": {
                    "id": {"type": "integer"},
                    "double_f": {"type": "number"},
                    "arr": {"type": "array", "items": {"type": "integer"}}
                },
                "primary_key": ["id"]
            }"#,
        )
        .unwrap();
        let config = IndexerConfig::new().index_all(true);
        let coll = CollectionIndexes::new(schema, "t1", "sidx1", "meta1", &config);
        (coll, config)
    }

    fn doc(body: serde_json::Value) -> Document {
        Document::with_timestamps(body, Some(TS.into()), Some(TS.into()))
    }

    fn any_index(_: &IndexMeta) -> bool {
        true
    }

    #[test]
    fn insert_adds_every_leaf() {
        let (coll, config) = setup();
        let doc = doc(json!({"id": 1, "double_f": 2, "arr": [1, 2]}));
        let pk = [FieldValue::Int(1)];

        let set = build_update_set(&coll, &config, Some(&doc), None, &pk, &any_index).unwrap();
        assert!(set.remove.is_empty());
        // created, updated, id, double_f, arr[0], arr[1]
        assert_eq!(set.add.len(), 6);
        assert_eq!(set.add_counts().get("arr"), Some(&2));
        assert_eq!(set.add_counts().get("double_f"), Some(&1));
    }

    #[test]
    fn update_diffs_only_changed_leaves() {
        let (coll, config) = setup();
        let old = doc(json!({"id": 1, "double_f": 2, "arr": [1, 2]}));
        let new = doc(json!({"id": 1, "double_f": 3, "arr": [1, 3]}));
        let pk = [FieldValue::Int(1)];

        let set = build_update_set(&coll, &config, Some(&new), Some(&old), &pk, &any_index).unwrap();
        let added: Vec<&str> = set.add.iter().map(|e| e.path.as_str()).collect();
        let removed: Vec<&str> = set.remove.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(added, vec!["double_f", "arr"]);
        assert_eq!(removed, vec!["double_f", "arr"]);
    }

    #[test]
    fn delete_removes_every_leaf() {
        let (coll, config) = setup();
        let doc = doc(json!({"id": 1, "double_f": 2, "arr": [1, 2]}));
        let pk = [FieldValue::Int(1)];

        let set = build_update_set(&coll, &config, None, Some(&doc), &pk, &any_index).unwrap();
        assert!(set.add.is_empty());
        assert_eq!(set.remove.len(), 6);
    }

    #[test]
    fn insert_then_delete_round_trips() {
        let (coll, config) = setup();
        let doc = doc(json!({"id": 1, "double_f": 2, "arr": [1, 2]}));
        let pk = [FieldValue::Int(1)];

        let insert =
            build_update_set(&coll, &config, Some(&doc), None, &pk, &any_index).unwrap();
        let delete =
            build_update_set(&coll, &config, None, Some(&doc), &pk, &any_index).unwrap();
        assert_eq!(insert.add, delete.remove);
    }

    #[test]
    fn filter_restricts_to_accepted_indexes() {
        let (coll, config) = setup();
        let doc = doc(json!({"id": 1, "double_f": 2, "arr": [1, 2]}));
        let pk = [FieldValue::Int(1)];

        let set =
            build_key_set(&coll, &config, &doc, &pk, &|m: &IndexMeta| m.name == "arr").unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.entries.iter().all(|e| e.path == "arr"));
    }

    #[test]
    fn unindexed_fields_are_skipped() {
        let schema = CollectionSchema::from_json(
            br#"{
                "title": "t1",
                "properties": {
                    "id": {"type": "integer"},
                    "plain": {"type": "string"},
                    "flagged": {"type": "string", "index": true}
                },
                "primary_key": ["id"]
            }"#,
        )
        .unwrap();
        let config = IndexerConfig::new();
        let coll = CollectionIndexes::new(schema, "t1", "sidx1", "meta1", &config);
        let doc = doc(json!({"id": 1, "plain": "x", "flagged": "y"}));

        let set = build_key_set(&coll, &config, &doc, &[FieldValue::Int(1)], &any_index).unwrap();
        let paths: Vec<&str> = set.entries.iter().map(|e| e.path.as_str()).collect();
        // id is not indexed either: only the timestamps and the flagged field.
        assert_eq!(paths, vec!["_tigris_created_at", "_tigris_updated_at", "flagged"]);
    }

    #[test]
    fn deterministic_across_runs() {
        let (coll, config) = setup();
        let doc = doc(json!({"id": 1, "double_f": 2, "arr": [1, 2]}));
        let pk = [FieldValue::Int(1)];
        let a = build_key_set(&coll, &config, &doc, &pk, &any_index).unwrap();
        let b = build_key_set(&coll, &config, &doc, &pk, &any_index).unwrap();
        assert_eq!(a, b);
    }
}
