//! Core storage engine traits.
//!
//! This module defines the transactional ordered-KV interface the index
//! subsystem is written against:
//!
//! - [`KvEngine`] - the entry point for starting transactions
//! - [`KvTransaction`] - snapshot-isolated transaction with
//!   `get`/`set`/`clear`/`clear_range`/`range_scan`
//! - [`RangeScan`] - ordered iteration over a key range
//!
//! Keys and values are opaque byte strings; ordering is byte-lexicographic.
//! All index maintenance happens inside a caller-supplied transaction, so the
//! layers above this trait never commit on their own.

use std::ops::Bound;
use std::sync::Arc;

use super::StorageResult;

/// A key-value pair returned by range scans.
pub type KeyValue = (Vec<u8>, Vec<u8>);

/// A storage engine that provides transactional key-value operations.
///
/// Implementations must be thread-safe (`Send + Sync`); transactions are
/// handed out per request and are not shared across threads.
pub trait KvEngine: Send + Sync {
    /// The transaction type for this engine.
    type Txn<'a>: KvTransaction
    where
        Self: 'a;

    /// Begin a read-only transaction over a consistent snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`super::StorageError::Transaction`] if the transaction cannot
    /// be started.
    fn begin_read(&self) -> StorageResult<Self::Txn<'_>>;

    /// Begin a read-write transaction.
    ///
    /// # Errors
    ///
    /// Returns [`super::StorageError::Transaction`] if the transaction cannot
    /// be started.
    fn begin_write(&self) -> StorageResult<Self::Txn<'_>>;
}

/// A transaction with snapshot-isolation semantics.
///
/// Write transactions must be committed explicitly; dropping one rolls its
/// changes back. Tables are addressed by name and created lazily on first
/// write.
pub trait KvTransaction {
    /// The range scan type for this transaction.
    type Scan<'a>: RangeScan
    where
        Self: 'a;

    /// Get a value by key from a table.
    ///
    /// Returns `Ok(None)` if the key (or the table) does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn get(&self, table: &str, key: &[u8]) -> StorageResult<Option<Vec<u8>>>;

    /// Set a key to a value, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`super::StorageError::ReadOnly`] on a read transaction.
    fn set(&mut self, table: &str, key: &[u8], value: &[u8]) -> StorageResult<()>;

    /// Clear a single key.
    ///
    /// Returns `Ok(true)` if the key existed.
    ///
    /// # Errors
    ///
    /// Returns [`super::StorageError::ReadOnly`] on a read transaction.
    fn clear(&mut self, table: &str, key: &[u8]) -> StorageResult<bool>;

    /// Clear every key in `[low, high)` and return how many were removed.
    ///
    /// # Errors
    ///
    /// Returns [`super::StorageError::ReadOnly`] on a read transaction.
    fn clear_range(&mut self, table: &str, low: &[u8], high: &[u8]) -> StorageResult<u64>;

    /// Scan a key range in order (reverse order when `reverse` is set).
    ///
    /// The scan observes the transaction's own uncommitted writes.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan cannot be started.
    fn range_scan(
        &self,
        table: &str,
        low: Bound<&[u8]>,
        high: Bound<&[u8]>,
        reverse: bool,
    ) -> StorageResult<Self::Scan<'_>>;

    /// Commit the transaction, making all writes durable atomically.
    ///
    /// # Errors
    ///
    /// Returns [`super::StorageError::Conflict`] or
    /// [`super::StorageError::Transaction`]; on error nothing is applied.
    fn commit(self) -> StorageResult<()>;

    /// Roll the transaction back, discarding all writes.
    ///
    /// # Errors
    ///
    /// Returns [`super::StorageError::Transaction`] if the rollback fails.
    fn rollback(self) -> StorageResult<()>;

    /// Check if this is a read-only transaction.
    fn is_read_only(&self) -> bool;
}

/// Ordered iteration over a key range.
pub trait RangeScan {
    /// Advance and return the next key-value pair, or `None` at the end.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying read fails; the scan is then
    /// exhausted.
    fn next(&mut self) -> StorageResult<Option<KeyValue>>;
}

/// Shared ownership of engines: `Arc<E>` is itself an engine.
impl<E: KvEngine> KvEngine for Arc<E> {
    type Txn<'a>
        = E::Txn<'a>
    where
        Self: 'a;

    fn begin_read(&self) -> StorageResult<Self::Txn<'_>> {
        (**self).begin_read()
    }

    fn begin_write(&self) -> StorageResult<Self::Txn<'_>> {
        (**self).begin_write()
    }
}
