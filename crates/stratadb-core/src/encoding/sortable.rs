//! Sort-order preserving encoding for document leaf values.
//!
//! This module provides the binary encoding for [`FieldValue`] that preserves
//! semantic order under byte-wise comparison of the encoded form. Every index
//! key embeds values in this encoding, which is what makes equality, range,
//! and sort queries answerable with nothing but KV range scans.
//!
//! # Encoding Design
//!
//! Each encoded value is a single type-order byte followed by a per-type
//! payload.
//!
//! ## Type ordering
//!
//! The tag byte establishes the cross-type order:
//! `Null (0x00) < Bool (0x01) < Int (0x02) < Double (0x03) < DateTime (0x04)
//! < String (0x05) < Bytes (0x06) < array stub (0x07)`. Ties within a type
//! are broken by the payload.
//!
//! ## Integer encoding
//!
//! Integers use a "sign-flip" encoding: XOR with `0x8000_0000_0000_0000`,
//! stored big-endian, so `i64::MIN < -1 < 0 < 1 < i64::MAX` byte-wise.
//!
//! ## Double encoding
//!
//! IEEE 754 bits with a transformation: positive doubles flip the sign bit,
//! negative doubles flip all bits. Negatives then sort before positives and
//! within negatives the order is corrected. NaN has no place in a total
//! order and is rejected with [`CoreError::Unsupported`].
//!
//! ## Datetime encoding
//!
//! RFC-3339 UTC text in the terminated-bytes encoding below; canonical UTC
//! strings carry a fixed-width fractional part, which makes them mutually
//! ordered byte-wise. Malformed datetime text is carried verbatim and
//! ordered as an opaque string.
//!
//! ## String and bytes encoding
//!
//! Strings and bytes use null-escape termination:
//! `0x00` in the data becomes `0x00 0x01`, and the sequence ends with
//! `0x00 0x00`. This keeps "a" < "aa" < "ab" < "b" and makes the part
//! self-delimiting inside a larger key.
//!
//! Strings exist in two forms: the **key** form keeps raw UTF-8 (round-trips,
//! used for field paths and primary keys) and the **index value** form stores
//! a truncated collation key (lossy, used for the value slot of index keys).

use crate::encoding::collation::collation_key;
use crate::error::{CoreError, CoreResult};
use crate::types::FieldValue;

/// Type-order tags for the sortable encoding.
///
/// The numeric order of these tags is the cross-type sort order and is part
/// of the on-disk format.
pub mod tags {
    /// Null values sort first.
    pub const NULL: u8 = 0x00;
    /// Boolean values (false = 0x00, true = 0x01).
    pub const BOOL: u8 = 0x01;
    /// 64-bit signed integers.
    pub const INT: u8 = 0x02;
    /// 64-bit floating point numbers.
    pub const DOUBLE: u8 = 0x03;
    /// RFC-3339 datetime text.
    pub const DATETIME: u8 = 0x04;
    /// UTF-8 strings (collated in index values, raw in key parts).
    pub const STRING: u8 = 0x05;
    /// Raw bytes.
    pub const BYTES: u8 = 0x06;
    /// Synthetic marker for a nested array; no payload.
    pub const ARRAY_STUB: u8 = 0x07;
}

/// Constant for flipping the sign bit of signed integers and doubles.
const SIGN_FLIP: u64 = 0x8000_0000_0000_0000;

/// Escape byte: 0x00 in data is written as 0x00 0x01.
const ESCAPE_BYTE: u8 = 0x01;
/// Terminator: end of a string/bytes part is marked by 0x00 0x00.
const TERMINATOR: u8 = 0x00;

/// A single decoded value part.
///
/// Strings decode differently depending on which encoding produced them:
/// key parts come back as [`DecodedScalar::String`], index value slots as
/// [`DecodedScalar::Collated`] (the collation key is one-way).
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedScalar {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit floating point number.
    Double(f64),
    /// RFC-3339 datetime text.
    DateTime(String),
    /// Raw UTF-8 string from a key part.
    String(String),
    /// Collation key bytes from an index value slot.
    Collated(Vec<u8>),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// Nested array stub marker.
    ArrayStub,
}

impl DecodedScalar {
    /// Converts back to a [`FieldValue`] where the decoding was lossless.
    ///
    /// Returns `None` for collated strings and array stubs.
    #[must_use]
    pub fn into_field_value(self) -> Option<FieldValue> {
        match self {
            Self::Null => Some(FieldValue::Null),
            Self::Bool(b) => Some(FieldValue::Bool(b)),
            Self::Int(i) => Some(FieldValue::Int(i)),
            Self::Double(f) => Some(FieldValue::Double(f)),
            Self::DateTime(s) => Some(FieldValue::DateTime(s)),
            Self::String(s) => Some(FieldValue::String(s)),
            Self::Bytes(b) => Some(FieldValue::Bytes(b)),
            Self::Collated(_) | Self::ArrayStub => None,
        }
    }
}

/// Encode bytes with null-escape termination.
pub fn encode_bytes_escaped(data: &[u8], buf: &mut Vec<u8>) {
    for &byte in data {
        if byte == 0x00 {
            buf.push(0x00);
            buf.push(ESCAPE_BYTE);
        } else {
            buf.push(byte);
        }
    }
    buf.push(TERMINATOR);
    buf.push(TERMINATOR);
}

/// Decode a null-escape terminated part.
///
/// Returns the decoded bytes and the number of input bytes consumed.
pub fn decode_bytes_escaped(data: &[u8]) -> CoreResult<(Vec<u8>, usize)> {
    let mut result = Vec::new();
    let mut i = 0;

    while i < data.len() {
        if data[i] == 0x00 {
            if i + 1 >= data.len() {
                return Err(CoreError::codec("unexpected end of escaped bytes"));
            }
            match data[i + 1] {
                TERMINATOR => return Ok((result, i + 2)),
                ESCAPE_BYTE => {
                    result.push(0x00);
                    i += 2;
                }
                other => {
                    return Err(CoreError::Codec(format!(
                        "invalid escape sequence: 0x00 0x{other:02x}"
                    )));
                }
            }
        } else {
            result.push(data[i]);
            i += 1;
        }
    }

    Err(CoreError::codec("missing terminator in escaped bytes"))
}

fn encode_int(i: i64, buf: &mut Vec<u8>) {
    buf.push(tags::INT);
    let encoded = (i as u64) ^ SIGN_FLIP;
    buf.extend_from_slice(&encoded.to_be_bytes());
}

fn encode_double(f: f64, buf: &mut Vec<u8>) -> CoreResult<()> {
    if f.is_nan() {
        return Err(CoreError::Unsupported("NaN is not indexable".into()));
    }
    buf.push(tags::DOUBLE);
    let bits = f.to_bits();
    let encoded = if bits & SIGN_FLIP == 0 {
        // Positive (including +0): flip sign bit.
        bits ^ SIGN_FLIP
    } else {
        // Negative (including -0): flip all bits.
        !bits
    };
    buf.extend_from_slice(&encoded.to_be_bytes());
    Ok(())
}

/// Append the lossless key-part encoding of `value` to `buf`.
///
/// Strings keep their raw UTF-8. This is the encoding for primary-key tuple
/// elements, where the decoder must recover the original value.
///
/// # Errors
///
/// Returns [`CoreError::Unsupported`] for NaN doubles.
pub fn encode_key_value(value: &FieldValue, buf: &mut Vec<u8>) -> CoreResult<()> {
    match value {
        FieldValue::Null => buf.push(tags::NULL),
        FieldValue::Bool(b) => {
            buf.push(tags::BOOL);
            buf.push(u8::from(*b));
        }
        FieldValue::Int(i) => encode_int(*i, buf),
        FieldValue::Double(f) => encode_double(*f, buf)?,
        FieldValue::DateTime(s) => {
            buf.push(tags::DATETIME);
            encode_bytes_escaped(s.as_bytes(), buf);
        }
        FieldValue::String(s) => {
            buf.push(tags::STRING);
            encode_bytes_escaped(s.as_bytes(), buf);
        }
        FieldValue::Bytes(b) => {
            buf.push(tags::BYTES);
            encode_bytes_escaped(b, buf);
        }
    }
    Ok(())
}

/// Append the index-value encoding of `value` to `buf`.
///
/// Identical to [`encode_key_value`] except that strings are stored as their
/// collation key truncated to `max_string_bytes` of input, so that index
/// order is dictionary order rather than byte order.
///
/// # Errors
///
/// Returns [`CoreError::Unsupported`] for NaN doubles.
pub fn encode_index_value(
    value: &FieldValue,
    max_string_bytes: usize,
    buf: &mut Vec<u8>,
) -> CoreResult<()> {
    if let FieldValue::String(s) = value {
        buf.push(tags::STRING);
        encode_bytes_escaped(&collation_key(s, max_string_bytes), buf);
        return Ok(());
    }
    encode_key_value(value, buf)
}

/// Append the synthetic array-stub marker to `buf`.
pub fn encode_array_stub(buf: &mut Vec<u8>) {
    buf.push(tags::ARRAY_STUB);
}

fn decode_fixed8(rest: &[u8], what: &str) -> CoreResult<u64> {
    let bytes: [u8; 8] = rest
        .get(..8)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| CoreError::Codec(format!("unexpected end of input reading {what}")))?;
    Ok(u64::from_be_bytes(bytes))
}

fn decode_value(bytes: &[u8], collated_strings: bool) -> CoreResult<(DecodedScalar, usize)> {
    let tag = *bytes.first().ok_or_else(|| CoreError::codec("unexpected end of input"))?;
    let rest = &bytes[1..];

    match tag {
        tags::NULL => Ok((DecodedScalar::Null, 1)),

        tags::BOOL => {
            let b = *rest
                .first()
                .ok_or_else(|| CoreError::codec("unexpected end of input reading bool"))?;
            Ok((DecodedScalar::Bool(b != 0), 2))
        }

        tags::INT => {
            let encoded = decode_fixed8(rest, "int")?;
            Ok((DecodedScalar::Int((encoded ^ SIGN_FLIP) as i64), 9))
        }

        tags::DOUBLE => {
            let encoded = decode_fixed8(rest, "double")?;
            let bits = if encoded & SIGN_FLIP != 0 {
                // Was positive: flip sign bit back.
                encoded ^ SIGN_FLIP
            } else {
                // Was negative: flip all bits back.
                !encoded
            };
            Ok((DecodedScalar::Double(f64::from_bits(bits)), 9))
        }

        tags::DATETIME => {
            let (raw, consumed) = decode_bytes_escaped(rest)?;
            let s = String::from_utf8(raw)
                .map_err(|e| CoreError::Codec(format!("invalid UTF-8 in datetime: {e}")))?;
            Ok((DecodedScalar::DateTime(s), 1 + consumed))
        }

        tags::STRING => {
            let (raw, consumed) = decode_bytes_escaped(rest)?;
            if collated_strings {
                Ok((DecodedScalar::Collated(raw), 1 + consumed))
            } else {
                let s = String::from_utf8(raw)
                    .map_err(|e| CoreError::Codec(format!("invalid UTF-8 in string: {e}")))?;
                Ok((DecodedScalar::String(s), 1 + consumed))
            }
        }

        tags::BYTES => {
            let (raw, consumed) = decode_bytes_escaped(rest)?;
            Ok((DecodedScalar::Bytes(raw), 1 + consumed))
        }

        tags::ARRAY_STUB => Ok((DecodedScalar::ArrayStub, 1)),

        _ => Err(CoreError::Codec(format!("unknown sortable type tag: {tag:#x}"))),
    }
}

/// Decode a key-part value (raw strings). Returns the value and consumed length.
///
/// # Errors
///
/// Returns [`CoreError::Codec`] if the bytes are malformed or truncated.
pub fn decode_key_value(bytes: &[u8]) -> CoreResult<(DecodedScalar, usize)> {
    decode_value(bytes, false)
}

/// Decode an index-value slot (collated strings). Returns the value and consumed length.
///
/// # Errors
///
/// Returns [`CoreError::Codec`] if the bytes are malformed or truncated.
pub fn decode_index_value(bytes: &[u8]) -> CoreResult<(DecodedScalar, usize)> {
    decode_value(bytes, true)
}
