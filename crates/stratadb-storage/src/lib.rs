//! `StrataDB` Storage
//!
//! Transactional ordered-KV abstraction and backend implementations.
//!
//! # Overview
//!
//! The index subsystem is stateless above a transaction handle: every
//! maintenance operation takes a [`KvTransaction`] and never commits on its
//! own. This crate defines that interface and ships a redb-backed
//! implementation.
//!
//! # Core traits
//!
//! - [`KvEngine`] - entry point for starting transactions
//! - [`KvTransaction`] - get/set/clear/`clear_range`/`range_scan` with
//!   snapshot isolation
//! - [`RangeScan`] - ordered (optionally reverse) iteration
//!
//! # Example
//!
//! ```
//! use stratadb_storage::backends::RedbEngine;
//! use stratadb_storage::{KvEngine, KvTransaction};
//!
//! let engine = RedbEngine::in_memory().unwrap();
//!
//! let mut tx = engine.begin_write().unwrap();
//! tx.set("users", b"user:1", b"Alice").unwrap();
//! tx.commit().unwrap();
//!
//! let tx = engine.begin_read().unwrap();
//! assert_eq!(tx.get("users", b"user:1").unwrap(), Some(b"Alice".to_vec()));
//! ```

pub mod backends;
pub mod engine;

pub use engine::{KeyValue, KvEngine, KvTransaction, RangeScan, StorageError, StorageResult};

#[cfg(test)]
mod tests {
    use std::ops::Bound;

    use crate::backends::RedbEngine;
    use crate::{KvEngine, KvTransaction, RangeScan, StorageError};

    fn engine() -> RedbEngine {
        RedbEngine::in_memory().expect("in-memory engine")
    }

    fn scan_all<T: KvTransaction>(tx: &T, table: &str, reverse: bool) -> Vec<Vec<u8>> {
        let mut scan = tx
            .range_scan(table, Bound::Unbounded, Bound::Unbounded, reverse)
            .expect("scan");
        let mut keys = Vec::new();
        while let Some((k, _)) = scan.next().expect("next") {
            keys.push(k);
        }
        keys
    }

    #[test]
    fn set_get_roundtrip() {
        let engine = engine();
        let mut tx = engine.begin_write().unwrap();
        tx.set("t", b"a", b"1").unwrap();
        tx.set("t", b"b", b"2").unwrap();
        tx.commit().unwrap();

        let tx = engine.begin_read().unwrap();
        assert_eq!(tx.get("t", b"a").unwrap(), Some(b"1".to_vec()));
        assert_eq!(tx.get("t", b"missing").unwrap(), None);
        assert_eq!(tx.get("missing_table", b"a").unwrap(), None);
    }

    #[test]
    fn rollback_discards_writes() {
        let engine = engine();
        let mut tx = engine.begin_write().unwrap();
        tx.set("t", b"a", b"1").unwrap();
        tx.rollback().unwrap();

        let tx = engine.begin_read().unwrap();
        assert_eq!(tx.get("t", b"a").unwrap(), None);
    }

    #[test]
    fn read_transactions_reject_writes() {
        let engine = engine();
        let mut tx = engine.begin_read().unwrap();
        assert!(tx.is_read_only());
        assert!(matches!(tx.set("t", b"a", b"1"), Err(StorageError::ReadOnly)));
        assert!(matches!(tx.clear("t", b"a"), Err(StorageError::ReadOnly)));
        assert!(matches!(tx.clear_range("t", b"a", b"z"), Err(StorageError::ReadOnly)));
    }

    #[test]
    fn range_scan_is_ordered() {
        let engine = engine();
        let mut tx = engine.begin_write().unwrap();
        for key in [b"c".as_slice(), b"a", b"b", b"e", b"d"] {
            tx.set("t", key, b"").unwrap();
        }
        tx.commit().unwrap();

        let tx = engine.begin_read().unwrap();
        let forward: Vec<Vec<u8>> =
            [b"a", b"b", b"c", b"d", b"e"].iter().map(|k| k.to_vec()).collect();
        let mut backward = forward.clone();
        backward.reverse();
        assert_eq!(scan_all(&tx, "t", false), forward);
        assert_eq!(scan_all(&tx, "t", true), backward);
        assert!(scan_all(&tx, "empty", false).is_empty());
    }

    #[test]
    fn range_scan_respects_bounds() {
        let engine = engine();
        let mut tx = engine.begin_write().unwrap();
        for key in [b"a", b"b", b"c", b"d"] {
            tx.set("t", key, b"").unwrap();
        }
        tx.commit().unwrap();

        let tx = engine.begin_read().unwrap();
        let mut scan = tx
            .range_scan("t", Bound::Included(b"b"), Bound::Excluded(b"d"), false)
            .unwrap();
        let mut keys = Vec::new();
        while let Some((k, _)) = scan.next().unwrap() {
            keys.push(k);
        }
        assert_eq!(keys, vec![b"b".to_vec(), b"c".to_vec()]);
    }

    #[test]
    fn range_scan_sees_own_writes() {
        let engine = engine();
        let mut tx = engine.begin_write().unwrap();
        tx.set("t", b"a", b"1").unwrap();
        tx.set("t", b"b", b"2").unwrap();
        assert_eq!(scan_all(&tx, "t", false).len(), 2);
        tx.commit().unwrap();
    }

    #[test]
    fn range_scan_pages_past_batch_size() {
        let engine = engine();
        let mut tx = engine.begin_write().unwrap();
        for i in 0u32..1000 {
            tx.set("t", &i.to_be_bytes(), b"").unwrap();
        }
        tx.commit().unwrap();

        let tx = engine.begin_read().unwrap();
        let keys = scan_all(&tx, "t", false);
        assert_eq!(keys.len(), 1000);
        assert!(keys.windows(2).all(|w| w[0] < w[1]));

        let keys = scan_all(&tx, "t", true);
        assert_eq!(keys.len(), 1000);
        assert!(keys.windows(2).all(|w| w[0] > w[1]));
    }

    #[test]
    fn clear_range_reports_count() {
        let engine = engine();
        let mut tx = engine.begin_write().unwrap();
        for key in [b"a", b"b", b"c", b"d"] {
            tx.set("t", key, b"x").unwrap();
        }
        assert_eq!(tx.clear_range("t", b"b", b"d").unwrap(), 2);
        tx.commit().unwrap();

        let tx = engine.begin_read().unwrap();
        assert_eq!(scan_all(&tx, "t", false), vec![b"a".to_vec(), b"d".to_vec()]);
    }

    #[test]
    fn on_disk_engine_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("strata.redb");
        {
            let engine = RedbEngine::open(&path).unwrap();
            let mut tx = engine.begin_write().unwrap();
            tx.set("t", b"a", b"1").unwrap();
            tx.commit().unwrap();
        }
        let engine = RedbEngine::open(&path).unwrap();
        let tx = engine.begin_read().unwrap();
        assert_eq!(tx.get("t", b"a").unwrap(), Some(b"1".to_vec()));
    }
}
