//! Transactional index maintenance.
//!
//! Every operation applies the full index side effects of one document
//! mutation inside the caller-supplied transaction and never commits on its
//! own. If the transaction aborts, data and index writes roll back together,
//! which is what keeps the entry set a pure function of the live documents.
//!
//! Stored entry values are empty: the key carries everything, including the
//! primary-key suffix that makes entries unique across documents. The
//! persisted row/size counters are adjusted in the same transaction as the
//! entries they account for, so they cannot drift from the entry count after
//! a commit.

use std::collections::HashSet;

use tracing::{debug, info};

use stratadb_core::encoding::keys;
use stratadb_core::FieldValue;
use stratadb_storage::{KvTransaction, RangeScan};

use crate::config::IndexerConfig;
use crate::document::Document;
use crate::error::IndexResult;
use crate::keyset::{build_update_set, UpdateSet};
use crate::metadata::{CollectionIndexes, IndexMeta, IndexState, IndexStats};

/// Row and byte-size statistics of a collection's index subspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexInfo {
    /// Number of live index entries.
    pub rows: i64,
    /// Stored bytes of live entries.
    pub size: i64,
}

/// Index maintenance operations for one collection.
pub struct SecondaryIndexer<'c> {
    coll: &'c CollectionIndexes,
    config: IndexerConfig,
}

impl<'c> SecondaryIndexer<'c> {
    /// Create a maintainer over a collection descriptor.
    #[must_use]
    pub fn new(coll: &'c CollectionIndexes, config: IndexerConfig) -> Self {
        Self { coll, config }
    }

    /// Index a newly inserted document.
    ///
    /// # Errors
    ///
    /// Fails if the codec rejects a value or the transaction fails; nothing
    /// is half-applied since the caller's transaction is atomic.
    pub fn index<T: KvTransaction>(
        &self,
        txn: &mut T,
        doc: &Document,
        primary_key: &[FieldValue],
    ) -> IndexResult<()> {
        let set =
            build_update_set(self.coll, &self.config, Some(doc), None, primary_key, &writable)?;
        self.apply(txn, &set, false)
    }

    /// Re-derive entries for an updated document: adds the keys only the new
    /// revision has, clears the keys only the old one had, leaves common
    /// keys untouched.
    ///
    /// # Errors
    ///
    /// Same contract as [`index`](Self::index).
    pub fn update<T: KvTransaction>(
        &self,
        txn: &mut T,
        new_doc: &Document,
        old_doc: &Document,
        primary_key: &[FieldValue],
    ) -> IndexResult<()> {
        let set = build_update_set(
            self.coll,
            &self.config,
            Some(new_doc),
            Some(old_doc),
            primary_key,
            &writable,
        )?;
        self.apply(txn, &set, false)
    }

    /// Clear every entry of a deleted document.
    ///
    /// # Errors
    ///
    /// Same contract as [`index`](Self::index).
    pub fn delete<T: KvTransaction>(
        &self,
        txn: &mut T,
        old_doc: &Document,
        primary_key: &[FieldValue],
    ) -> IndexResult<()> {
        let set =
            build_update_set(self.coll, &self.config, None, Some(old_doc), primary_key, &writable)?;
        self.apply(txn, &set, false)
    }

    /// Index one document for the online builder: only entries of the given
    /// building indexes, skipping keys a concurrent writer already stored so
    /// the counters stay exact.
    pub(crate) fn index_for_build<T: KvTransaction>(
        &self,
        txn: &mut T,
        doc: &Document,
        primary_key: &[FieldValue],
        building: &HashSet<u32>,
    ) -> IndexResult<()> {
        let set = build_update_set(
            self.coll,
            &self.config,
            Some(doc),
            None,
            primary_key,
            &|meta| building.contains(&meta.id),
        )?;
        self.apply(txn, &set, true)
    }

    fn apply<T: KvTransaction>(
        &self,
        txn: &mut T,
        set: &UpdateSet,
        skip_existing: bool,
    ) -> IndexResult<()> {
        let mut rows = 0i64;
        let mut size = 0i64;

        for entry in &set.add {
            if skip_existing && txn.get(&self.coll.index_table, &entry.key)?.is_some() {
                continue;
            }
            txn.set(&self.coll.index_table, &entry.key, &[])?;
            rows += 1;
            size += entry.key.len() as i64;
        }
        for entry in &set.remove {
            if txn.clear(&self.coll.index_table, &entry.key)? {
                rows -= 1;
                size -= entry.key.len() as i64;
            }
        }

        if rows != 0 || size != 0 {
            self.adjust_stats(txn, rows, size)?;
        }
        debug!(added = set.add.len(), removed = set.remove.len(), "applied index delta");
        Ok(())
    }

    /// Drop one index: range-clear its field subspaces, settle the counters,
    /// and mark it `Deleted`.
    ///
    /// Legal in any state. Other indexes' entries are untouched since leaf
    /// paths do not overlap across indexes.
    ///
    /// # Errors
    ///
    /// Propagates storage failures; the caller's transaction decides
    /// atomicity.
    pub fn delete_index<T: KvTransaction>(
        &self,
        txn: &mut T,
        meta: &IndexMeta,
    ) -> IndexResult<IndexMeta> {
        let table_name = self.coll.index_table.as_bytes();
        let mut removed_rows = 0i64;
        let mut removed_size = 0i64;

        for path in &meta.fields {
            let low = keys::field_prefix(table_name, path);
            let high = keys::increment_prefix(&low);
            {
                let mut scan = txn.range_scan(
                    &self.coll.index_table,
                    std::ops::Bound::Included(low.as_slice()),
                    std::ops::Bound::Excluded(high.as_slice()),
                    false,
                )?;
                while let Some((key, value)) = scan.next()? {
                    removed_size += (key.len() + value.len()) as i64;
                }
            }
            removed_rows += txn.clear_range(&self.coll.index_table, &low, &high)? as i64;
        }

        if removed_rows != 0 || removed_size != 0 {
            self.adjust_stats(txn, -removed_rows, -removed_size)?;
        }

        let mut dropped = meta.clone();
        dropped.state = IndexState::Deleted;
        self.coll.persist_meta(txn, &dropped)?;
        info!(index = %meta.name, rows = removed_rows, "dropped index");
        Ok(dropped)
    }

    /// Read the persisted row/size counters.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub fn index_info<T: KvTransaction>(&self, txn: &T) -> IndexResult<IndexInfo> {
        let stats = self.coll.read_stats(txn)?;
        Ok(IndexInfo { rows: stats.rows, size: stats.size })
    }

    fn adjust_stats<T: KvTransaction>(
        &self,
        txn: &mut T,
        delta_rows: i64,
        delta_size: i64,
    ) -> IndexResult<()> {
        let stats = self.coll.read_stats(txn)?;
        let next = IndexStats {
            rows: stats.rows + delta_rows,
            size: stats.size + delta_size,
        };
        // Negative counters mean derivation and storage disagree, which is a
        // bug in this crate, not a user condition.
        debug_assert!(next.rows >= 0, "index row counter went negative");
        debug_assert!(next.size >= 0, "index size counter went negative");
        self.coll.write_stats(txn, next)?;
        Ok(())
    }
}

fn writable(meta: &IndexMeta) -> bool {
    meta.state.is_writable()
}
