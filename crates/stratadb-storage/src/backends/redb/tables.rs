//! Redb table definitions and key encoding utilities.
//!
//! Redb requires static table names, so the backend stores every logical
//! table in a single physical table and prefixes each key with its logical
//! table name. Collection data, index entries, and metadata therefore live
//! side by side, partitioned by prefix ranges.

use redb::TableDefinition;

/// The physical table that stores all key-value pairs.
/// Logical table names are prefixed to keys.
pub const DATA_TABLE: TableDefinition<'static, &[u8], &[u8]> = TableDefinition::new("strata_data");

/// Separator byte between table name and key in the encoded key.
///
/// Sorts below every byte a table name can contain, so each logical table is
/// one contiguous physical range.
pub const KEY_SEPARATOR: u8 = 0x00;

/// Encode a logical table name and key into a physical key.
///
/// The format is: `<table_name><separator><key>`.
#[must_use]
pub fn encode_key(table: &str, key: &[u8]) -> Vec<u8> {
    let mut encoded = Vec::with_capacity(table.len() + 1 + key.len());
    encoded.extend_from_slice(table.as_bytes());
    encoded.push(KEY_SEPARATOR);
    encoded.extend_from_slice(key);
    encoded
}

/// Decode a physical key into its logical table name and original key.
///
/// Returns `None` if the key is malformed (missing separator).
#[must_use]
pub fn decode_key(encoded: &[u8]) -> Option<(&str, &[u8])> {
    let sep_pos = encoded.iter().position(|&b| b == KEY_SEPARATOR)?;
    let table = std::str::from_utf8(&encoded[..sep_pos]).ok()?;
    Some((table, &encoded[sep_pos + 1..]))
}

/// Create the start key for range scans on a logical table.
#[must_use]
pub fn table_start_key(table: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(table.len() + 1);
    key.extend_from_slice(table.as_bytes());
    key.push(KEY_SEPARATOR);
    key
}

/// Create the end key for range scans on a logical table.
/// This is the first key that would NOT belong to the table.
#[must_use]
pub fn table_end_key(table: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(table.len() + 1);
    key.extend_from_slice(table.as_bytes());
    key.push(KEY_SEPARATOR + 1);
    key
}
