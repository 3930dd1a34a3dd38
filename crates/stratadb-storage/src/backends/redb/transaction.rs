//! Redb transaction implementation.
//!
//! This module provides the `RedbTransaction` type which implements
//! [`KvTransaction`] for both read-only and read-write transactions.
//!
//! # Memory-Efficient Scans
//!
//! Range scans use batched streaming to avoid loading entire tables into
//! memory and to avoid holding redb range guards (which borrow their table)
//! across calls. Entries are loaded in batches, and the scan's live bound is
//! advanced past the last yielded key before the next batch is fetched.
//! Within one transaction this observes a stable snapshot, with
//! read-your-own-writes for write transactions.

use std::collections::VecDeque;
use std::ops::Bound;

use redb::{ReadTransaction, ReadableTable, TableError, WriteTransaction};

use crate::engine::{KeyValue, KvTransaction, RangeScan, StorageError, StorageResult};

use super::tables::{decode_key, encode_key, table_end_key, table_start_key, DATA_TABLE};

/// Default batch size for scan operations.
/// This limits memory usage while maintaining good performance.
const DEFAULT_BATCH_SIZE: usize = 1000;

/// A transaction for the redb storage engine.
///
/// This type wraps both read-only and read-write redb transactions,
/// providing a unified interface through the [`KvTransaction`] trait.
///
/// Note: we allow the `large_enum_variant` lint here because boxing the
/// `WriteTransaction` would add indirection overhead for every operation,
/// and transactions are typically short-lived.
#[allow(clippy::large_enum_variant)]
pub enum RedbTransaction {
    /// A read-only transaction.
    Read(ReadTransaction),
    /// A read-write transaction.
    Write(WriteTransaction),
}

impl RedbTransaction {
    /// Create a new read-only transaction.
    #[must_use]
    pub const fn new_read(tx: ReadTransaction) -> Self {
        Self::Read(tx)
    }

    /// Create a new read-write transaction.
    #[must_use]
    pub const fn new_write(tx: WriteTransaction) -> Self {
        Self::Write(tx)
    }

    /// Translate logical bounds into the physical encoded range of a table.
    ///
    /// Exclusive logical bounds become the smallest/largest physical keys
    /// past the bound value: appending `0x00` to an encoded key yields the
    /// first key strictly after it.
    fn physical_range(
        table: &str,
        low: Bound<&[u8]>,
        high: Bound<&[u8]>,
    ) -> (Vec<u8>, Vec<u8>) {
        let start = match low {
            Bound::Included(key) => encode_key(table, key),
            Bound::Excluded(key) => {
                let mut start = encode_key(table, key);
                start.push(0x00);
                start
            }
            Bound::Unbounded => table_start_key(table),
        };
        let end = match high {
            Bound::Included(key) => {
                let mut end = encode_key(table, key);
                end.push(0x00);
                end
            }
            Bound::Excluded(key) => encode_key(table, key),
            Bound::Unbounded => table_end_key(table),
        };
        (start, end)
    }

    /// Fetch up to `batch_size` pairs from a logical table range, in scan
    /// order (descending when `reverse` is set).
    fn fetch_batch(
        &self,
        table: &str,
        low: Bound<&[u8]>,
        high: Bound<&[u8]>,
        reverse: bool,
        batch_size: usize,
    ) -> StorageResult<Vec<KeyValue>> {
        let (start, end) = Self::physical_range(table, low, high);
        if start >= end {
            return Ok(Vec::new());
        }
        match self {
            Self::Read(tx) => match tx.open_table(DATA_TABLE) {
                Ok(t) => collect_batch(&t, &start, &end, reverse, batch_size),
                Err(TableError::TableDoesNotExist(_)) => Ok(Vec::new()),
                Err(e) => Err(e.into()),
            },
            Self::Write(tx) => {
                let t = tx.open_table(DATA_TABLE)?;
                collect_batch(&t, &start, &end, reverse, batch_size)
            }
        }
    }
}

fn collect_batch<T>(
    table: &T,
    start: &[u8],
    end: &[u8],
    reverse: bool,
    batch_size: usize,
) -> StorageResult<Vec<KeyValue>>
where
    T: ReadableTable<&'static [u8], &'static [u8]>,
{
    let range = table.range::<&[u8]>(start..end)?;
    let mut entries = Vec::with_capacity(batch_size.min(1024));
    if reverse {
        for result in range.rev() {
            if entries.len() >= batch_size {
                break;
            }
            let (k, v) = result?;
            if let Some((_, logical_key)) = decode_key(k.value()) {
                entries.push((logical_key.to_vec(), v.value().to_vec()));
            }
        }
    } else {
        for result in range {
            if entries.len() >= batch_size {
                break;
            }
            let (k, v) = result?;
            if let Some((_, logical_key)) = decode_key(k.value()) {
                entries.push((logical_key.to_vec(), v.value().to_vec()));
            }
        }
    }
    Ok(entries)
}

impl KvTransaction for RedbTransaction {
    type Scan<'a>
        = RedbScan<'a>
    where
        Self: 'a;

    fn get(&self, table: &str, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        let encoded_key = encode_key(table, key);
        match self {
            Self::Read(tx) => match tx.open_table(DATA_TABLE) {
                Ok(t) => Ok(t.get(encoded_key.as_slice())?.map(|guard| guard.value().to_vec())),
                // No data table means no data, which is not an error.
                Err(TableError::TableDoesNotExist(_)) => Ok(None),
                Err(e) => Err(e.into()),
            },
            Self::Write(tx) => {
                let t = tx.open_table(DATA_TABLE)?;
                let result = t.get(encoded_key.as_slice())?.map(|guard| guard.value().to_vec());
                Ok(result)
            }
        }
    }

    fn set(&mut self, table: &str, key: &[u8], value: &[u8]) -> StorageResult<()> {
        match self {
            Self::Read(_) => Err(StorageError::ReadOnly),
            Self::Write(tx) => {
                let encoded_key = encode_key(table, key);
                let mut t = tx.open_table(DATA_TABLE)?;
                t.insert(encoded_key.as_slice(), value)?;
                Ok(())
            }
        }
    }

    fn clear(&mut self, table: &str, key: &[u8]) -> StorageResult<bool> {
        match self {
            Self::Read(_) => Err(StorageError::ReadOnly),
            Self::Write(tx) => {
                let encoded_key = encode_key(table, key);
                let mut t = tx.open_table(DATA_TABLE)?;
                let result = t.remove(encoded_key.as_slice())?.is_some();
                Ok(result)
            }
        }
    }

    fn clear_range(&mut self, table: &str, low: &[u8], high: &[u8]) -> StorageResult<u64> {
        match self {
            Self::Read(_) => Err(StorageError::ReadOnly),
            Self::Write(tx) => {
                let (start, end) =
                    Self::physical_range(table, Bound::Included(low), Bound::Excluded(high));
                if start >= end {
                    return Ok(0);
                }
                let keys: Vec<Vec<u8>> = {
                    let t = tx.open_table(DATA_TABLE)?;
                    t.range::<&[u8]>(start.as_slice()..end.as_slice())?
                        .map(|item| item.map(|(k, _)| k.value().to_vec()))
                        .collect::<Result<_, _>>()?
                };
                let mut t = tx.open_table(DATA_TABLE)?;
                for key in &keys {
                    t.remove(key.as_slice())?;
                }
                Ok(keys.len() as u64)
            }
        }
    }

    fn range_scan(
        &self,
        table: &str,
        low: Bound<&[u8]>,
        high: Bound<&[u8]>,
        reverse: bool,
    ) -> StorageResult<Self::Scan<'_>> {
        Ok(RedbScan {
            txn: self,
            table: table.to_owned(),
            low: low.map(<[u8]>::to_vec),
            high: high.map(<[u8]>::to_vec),
            reverse,
            buf: VecDeque::new(),
            done: false,
        })
    }

    fn commit(self) -> StorageResult<()> {
        match self {
            // Read transactions don't need an explicit commit.
            Self::Read(_) => Ok(()),
            Self::Write(tx) => {
                tx.commit()?;
                Ok(())
            }
        }
    }

    fn rollback(self) -> StorageResult<()> {
        match self {
            // Read transactions just get dropped.
            Self::Read(_) => Ok(()),
            Self::Write(tx) => {
                tx.abort()?;
                Ok(())
            }
        }
    }

    fn is_read_only(&self) -> bool {
        matches!(self, Self::Read(_))
    }
}

/// Batched range scan over one logical table.
///
/// The scan holds logical bounds rather than a redb range guard; each refill
/// fetches a batch through [`RedbTransaction::fetch_batch`] and advances the
/// live bound past the last key it saw.
pub struct RedbScan<'t> {
    txn: &'t RedbTransaction,
    table: String,
    low: Bound<Vec<u8>>,
    high: Bound<Vec<u8>>,
    reverse: bool,
    buf: VecDeque<KeyValue>,
    done: bool,
}

impl RedbScan<'_> {
    fn refill(&mut self) -> StorageResult<()> {
        let fetched = self.txn.fetch_batch(
            &self.table,
            as_slice_bound(&self.low),
            as_slice_bound(&self.high),
            self.reverse,
            DEFAULT_BATCH_SIZE,
        )?;

        if fetched.len() < DEFAULT_BATCH_SIZE {
            self.done = true;
        } else if let Some((last, _)) = fetched.last() {
            if self.reverse {
                self.high = Bound::Excluded(last.clone());
            } else {
                self.low = Bound::Excluded(last.clone());
            }
        }
        self.buf.extend(fetched);
        Ok(())
    }
}

impl RangeScan for RedbScan<'_> {
    fn next(&mut self) -> StorageResult<Option<KeyValue>> {
        if self.buf.is_empty() && !self.done {
            self.refill()?;
        }
        Ok(self.buf.pop_front())
    }
}

fn as_slice_bound(bound: &Bound<Vec<u8>>) -> Bound<&[u8]> {
    match bound {
        Bound::Included(v) => Bound::Included(v.as_slice()),
        Bound::Excluded(v) => Bound::Excluded(v.as_slice()),
        Bound::Unbounded => Bound::Unbounded,
    }
}
