//! Online index build over a pre-existing collection.
//!
//! Populating an index for data that predates it runs in three phases:
//!
//! 1. every `Inactive` index is marked `Building` (one transaction); from
//!    that commit on, concurrent writers maintain the index themselves;
//! 2. the data subspace is scanned in key order, one fresh write transaction
//!    per bounded batch, deriving and storing the entries of the building
//!    indexes for each document;
//! 3. after the scan, the indexes transition `Building -> Active`.
//!
//! Because writers index to `Building` indexes, the scan is equivalent to a
//! snapshot pass plus a replay of concurrent writes: at activation the index
//! holds exactly the entries of the committed collection state. Entries a
//! writer stored first are detected and skipped, which keeps the row/size
//! counters exact.
//!
//! Cancellation is checked between batches; a cancelled build leaves its
//! indexes in `Building`, safe to resume by running the build again.

use std::collections::HashSet;
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info};

use stratadb_core::encoding::keys;
use stratadb_storage::{KvEngine, KvTransaction, RangeScan, StorageError};

use crate::config::IndexerConfig;
use crate::document::Document;
use crate::error::IndexResult;
use crate::maintainer::SecondaryIndexer;
use crate::metadata::{CollectionIndexes, IndexMeta, IndexState};

/// Drives online index builds against a storage engine.
pub struct IndexBuilder<'e, E: KvEngine> {
    engine: &'e E,
    config: IndexerConfig,
    cancel: Option<Arc<AtomicBool>>,
}

impl<'e, E: KvEngine> IndexBuilder<'e, E> {
    /// Create a builder over an engine.
    #[must_use]
    pub fn new(engine: &'e E, config: IndexerConfig) -> Self {
        Self { engine, config, cancel: None }
    }

    /// Attach a cancellation flag checked between batches.
    #[must_use]
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|f| f.load(Ordering::Relaxed))
    }

    /// Build every `Inactive` (or resumed `Building`) index of the
    /// collection, returning the final index list.
    ///
    /// A no-op when nothing needs building.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Cancelled`] between batches when the flag is
    /// set; the marked indexes stay `Building` and the build can be rerun.
    /// Storage conflicts propagate per batch; prior batches stay committed,
    /// which is safe because re-indexing a document is idempotent.
    pub fn build_collection(&self, coll: &mut CollectionIndexes) -> IndexResult<Vec<IndexMeta>> {
        let targets: Vec<u32> = coll
            .indexes
            .iter()
            .filter(|m| matches!(m.state, IndexState::Inactive | IndexState::Building))
            .map(|m| m.id)
            .collect();
        if targets.is_empty() {
            return Ok(coll.indexes.clone());
        }

        {
            let mut txn = self.engine.begin_write()?;
            for id in &targets {
                coll.set_state(*id, IndexState::Building);
            }
            coll.persist_all(&mut txn)?;
            txn.commit()?;
        }
        info!(
            collection = %coll.schema.name,
            indexes = targets.len(),
            "index build started"
        );

        let building: HashSet<u32> = targets.iter().copied().collect();
        let mut cursor: Option<Vec<u8>> = None;
        let mut scanned = 0usize;

        loop {
            if self.is_cancelled() {
                return Err(StorageError::Cancelled.into());
            }

            let mut txn = self.engine.begin_write()?;
            let batch = {
                let low = match &cursor {
                    Some(key) => Bound::Excluded(key.as_slice()),
                    None => Bound::Unbounded,
                };
                let mut scan =
                    txn.range_scan(&coll.data_table, low, Bound::Unbounded, false)?;
                let mut batch = Vec::with_capacity(self.config.build_batch_rows);
                while batch.len() < self.config.build_batch_rows {
                    match scan.next()? {
                        Some(pair) => batch.push(pair),
                        None => break,
                    }
                }
                batch
            };
            if batch.is_empty() {
                txn.rollback()?;
                break;
            }

            let indexer = SecondaryIndexer::new(coll, self.config.clone());
            for (key, value) in &batch {
                let primary_key = keys::decode_primary_key(key)?;
                let doc = Document::from_bytes(value)?;
                indexer.index_for_build(&mut txn, &doc, &primary_key, &building)?;
            }

            let full_batch = batch.len() == self.config.build_batch_rows;
            scanned += batch.len();
            cursor = batch.into_iter().last().map(|(key, _)| key);
            txn.commit()?;
            debug!(scanned, "index build batch committed");

            if !full_batch {
                break;
            }
        }

        let mut txn = self.engine.begin_write()?;
        for id in &targets {
            coll.set_state(*id, IndexState::Active);
        }
        coll.persist_all(&mut txn)?;
        txn.commit()?;
        info!(collection = %coll.schema.name, scanned, "index build complete");

        Ok(coll.indexes.clone())
    }
}
