//! Index key tuples for ordered storage.
//!
//! Every secondary index entry is one key in the collection's index table,
//! laid out as a concatenation of self-delimiting parts:
//!
//! ```text
//! ("skey", table_index_name, field_path, type_order, value, array_pos, index_id, pk...)
//! ```
//!
//! - `"skey"` — constant subspace marker separating secondary-index keys from
//!   anything else that may share the table.
//! - `table_index_name` — the collection's opaque index-subspace identifier.
//! - `field_path` — dotted UTF-8 path of the leaf (`obj.sub.leaf`); nested
//!   arrays terminate the path with the [`ARRAY_STUB_FIELD`] segment.
//! - `type_order` + `value` — the sortable encoding of the leaf value
//!   ([`sortable`]), with strings in their collated form.
//! - `array_pos` — 0-origin position within the source array, big-endian u32.
//! - `index_id` — id of the owning index, big-endian u32.
//! - `pk...` — the document's primary-key tuple in the lossless key encoding,
//!   making entries unique and letting a scan yield primary keys directly.
//!
//! Byte-wise order over whole keys therefore agrees with
//! `(field_path, type order, value, array_pos, primary key)` ascending, which
//! is the order range scans rely on.

use crate::encoding::sortable::{self, DecodedScalar};
use crate::error::{CoreError, CoreResult};
use crate::types::FieldValue;

/// Subspace marker leading every secondary index key.
pub const SECONDARY_SUBSPACE: &[u8] = b"skey";

/// Synthetic trailing path segment marking a nested array.
pub const ARRAY_STUB_FIELD: &str = "_tigris_array_stub";

/// One decoded part of an index key, for test introspection and EXPLAIN dumps.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyPart {
    /// An opaque byte part (subspace marker, table index name).
    Bytes(Vec<u8>),
    /// A raw UTF-8 part (field path).
    Str(String),
    /// Null leaf value.
    Null,
    /// Boolean leaf value.
    Bool(bool),
    /// Integer leaf value.
    Int(i64),
    /// Double leaf value.
    Double(f64),
    /// Datetime leaf value.
    DateTime(String),
    /// Collation-key bytes of a string leaf value.
    Collated(Vec<u8>),
    /// Nested array stub.
    ArrayStub,
    /// Array position.
    Pos(u32),
    /// Index id.
    Id(u32),
}

impl From<DecodedScalar> for KeyPart {
    fn from(value: DecodedScalar) -> Self {
        match value {
            DecodedScalar::Null => Self::Null,
            DecodedScalar::Bool(b) => Self::Bool(b),
            DecodedScalar::Int(i) => Self::Int(i),
            DecodedScalar::Double(f) => Self::Double(f),
            DecodedScalar::DateTime(s) => Self::DateTime(s),
            DecodedScalar::String(s) => Self::Str(s),
            DecodedScalar::Collated(k) => Self::Collated(k),
            DecodedScalar::Bytes(b) => Self::Bytes(b),
            DecodedScalar::ArrayStub => Self::ArrayStub,
        }
    }
}

fn push_header(table_index_name: &[u8], field_path: &str, buf: &mut Vec<u8>) {
    sortable::encode_bytes_escaped(SECONDARY_SUBSPACE, buf);
    sortable::encode_bytes_escaped(table_index_name, buf);
    sortable::encode_bytes_escaped(field_path.as_bytes(), buf);
}

fn push_tail(array_pos: u32, index_id: u32, primary_key: &[FieldValue], buf: &mut Vec<u8>) -> CoreResult<()> {
    buf.extend_from_slice(&array_pos.to_be_bytes());
    buf.extend_from_slice(&index_id.to_be_bytes());
    for part in primary_key {
        sortable::encode_key_value(part, buf)?;
    }
    Ok(())
}

/// Encode a complete index entry key for a scalar leaf.
///
/// # Errors
///
/// Returns [`CoreError::Unsupported`] for NaN doubles.
pub fn encode_index_entry(
    table_index_name: &[u8],
    field_path: &str,
    value: &FieldValue,
    array_pos: u32,
    index_id: u32,
    primary_key: &[FieldValue],
    max_string_bytes: usize,
) -> CoreResult<Vec<u8>> {
    let mut buf = Vec::with_capacity(64);
    push_header(table_index_name, field_path, &mut buf);
    sortable::encode_index_value(value, max_string_bytes, &mut buf)?;
    push_tail(array_pos, index_id, primary_key, &mut buf)?;
    Ok(buf)
}

/// Encode a complete index entry key for a nested-array stub.
///
/// `field_path` must already carry the [`ARRAY_STUB_FIELD`] segment.
///
/// # Errors
///
/// Returns [`CoreError::Unsupported`] if a primary-key part is not encodable.
pub fn encode_stub_entry(
    table_index_name: &[u8],
    field_path: &str,
    array_pos: u32,
    index_id: u32,
    primary_key: &[FieldValue],
) -> CoreResult<Vec<u8>> {
    let mut buf = Vec::with_capacity(48);
    push_header(table_index_name, field_path, &mut buf);
    sortable::encode_array_stub(&mut buf);
    push_tail(array_pos, index_id, primary_key, &mut buf)?;
    Ok(buf)
}

/// Prefix covering every entry of one field, all value types included.
///
/// `[field_prefix, increment_prefix(field_prefix))` is the field's subspace.
#[must_use]
pub fn field_prefix(table_index_name: &[u8], field_path: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(32);
    push_header(table_index_name, field_path, &mut buf);
    buf
}

/// Prefix covering exactly the null entries of one field.
#[must_use]
pub fn null_value_prefix(table_index_name: &[u8], field_path: &str) -> Vec<u8> {
    let mut buf = field_prefix(table_index_name, field_path);
    buf.push(sortable::tags::NULL);
    buf
}

/// Prefix covering exactly the entries of one field with one value.
///
/// # Errors
///
/// Returns [`CoreError::Unsupported`] for NaN doubles.
pub fn value_prefix(
    table_index_name: &[u8],
    field_path: &str,
    value: &FieldValue,
    max_string_bytes: usize,
) -> CoreResult<Vec<u8>> {
    let mut buf = field_prefix(table_index_name, field_path);
    sortable::encode_index_value(value, max_string_bytes, &mut buf)?;
    Ok(buf)
}

/// Create an exclusive upper bound by incrementing a prefix.
///
/// The returned key is the smallest key greater than every key that starts
/// with `prefix`.
#[must_use]
pub fn increment_prefix(prefix: &[u8]) -> Vec<u8> {
    let mut end = prefix.to_vec();
    let mut i = end.len();
    while i > 0 {
        i -= 1;
        if end[i] < 255 {
            end[i] += 1;
            return end;
        }
        end[i] = 0;
    }
    // All bytes were 255, append a byte.
    end.push(0);
    end
}

/// Decode an index key into its ordered parts.
///
/// Exposed for test introspection and humanised key dumps; production reads
/// only need [`primary_key_of`].
///
/// # Errors
///
/// Returns [`CoreError::Codec`] if the key is malformed.
pub fn index_parts(key: &[u8]) -> CoreResult<Vec<KeyPart>> {
    let mut parts = Vec::with_capacity(8);
    let mut rest = key;

    let (subspace, n) = sortable::decode_bytes_escaped(rest)?;
    if subspace != SECONDARY_SUBSPACE {
        return Err(CoreError::codec("not a secondary index key"));
    }
    parts.push(KeyPart::Bytes(subspace));
    rest = &rest[n..];

    let (table, n) = sortable::decode_bytes_escaped(rest)?;
    parts.push(KeyPart::Bytes(table));
    rest = &rest[n..];

    let (path, n) = sortable::decode_bytes_escaped(rest)?;
    let path = String::from_utf8(path)
        .map_err(|e| CoreError::Codec(format!("invalid UTF-8 in field path: {e}")))?;
    parts.push(KeyPart::Str(path));
    rest = &rest[n..];

    let (value, n) = sortable::decode_index_value(rest)?;
    parts.push(value.into());
    rest = &rest[n..];

    for what in ["array position", "index id"] {
        let raw: [u8; 4] = rest
            .get(..4)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(|| CoreError::Codec(format!("unexpected end of key reading {what}")))?;
        let v = u32::from_be_bytes(raw);
        parts.push(if what == "index id" { KeyPart::Id(v) } else { KeyPart::Pos(v) });
        rest = &rest[4..];
    }

    while !rest.is_empty() {
        let (value, n) = sortable::decode_key_value(rest)?;
        parts.push(value.into());
        rest = &rest[n..];
    }

    Ok(parts)
}

/// Extract the primary-key tuple from the tail of an index key.
///
/// # Errors
///
/// Returns [`CoreError::Codec`] if the key is malformed.
pub fn primary_key_of(key: &[u8]) -> CoreResult<Vec<FieldValue>> {
    let mut rest = key;
    for _ in 0..3 {
        let (_, n) = sortable::decode_bytes_escaped(rest)?;
        rest = &rest[n..];
    }
    let (_, n) = sortable::decode_index_value(rest)?;
    rest = &rest[n..];
    rest = rest
        .get(8..)
        .ok_or_else(|| CoreError::codec("unexpected end of key reading positions"))?;

    let mut pk = Vec::with_capacity(1);
    while !rest.is_empty() {
        let (value, n) = sortable::decode_key_value(rest)?;
        pk.push(
            value
                .into_field_value()
                .ok_or_else(|| CoreError::codec("non-scalar part in primary key"))?,
        );
        rest = &rest[n..];
    }
    if pk.is_empty() {
        return Err(CoreError::codec("index key carries no primary key"));
    }
    Ok(pk)
}

/// Encode a primary-key tuple as a data-table key.
///
/// # Errors
///
/// Returns [`CoreError::Unsupported`] for NaN doubles.
pub fn encode_primary_key(primary_key: &[FieldValue]) -> CoreResult<Vec<u8>> {
    let mut buf = Vec::with_capacity(16);
    for part in primary_key {
        sortable::encode_key_value(part, &mut buf)?;
    }
    Ok(buf)
}

/// Decode a data-table key back into the primary-key tuple.
///
/// # Errors
///
/// Returns [`CoreError::Codec`] if the bytes are malformed.
pub fn decode_primary_key(bytes: &[u8]) -> CoreResult<Vec<FieldValue>> {
    let mut rest = bytes;
    let mut pk = Vec::with_capacity(1);
    while !rest.is_empty() {
        let (value, n) = sortable::decode_key_value(rest)?;
        pk.push(
            value
                .into_field_value()
                .ok_or_else(|| CoreError::codec("non-scalar part in primary key"))?,
        );
        rest = &rest[n..];
    }
    Ok(pk)
}
