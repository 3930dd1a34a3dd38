//! Stored document envelope and schema-typed scalar conversion.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use stratadb_core::FieldValue;

use crate::error::{IndexError, IndexResult};
use crate::schema::{CollectionSchema, ScalarType};

/// Synthetic datetime field stamped at first insert.
pub const CREATED_AT_FIELD: &str = "_tigris_created_at";
/// Synthetic datetime field stamped on every write.
pub const UPDATED_AT_FIELD: &str = "_tigris_updated_at";

/// A document as stored in the collection's data table: the JSON body plus
/// the auto-timestamp metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// When the document was first inserted, RFC-3339 UTC.
    pub created_at: Option<String>,
    /// When the document was last written, RFC-3339 UTC.
    pub updated_at: Option<String>,
    /// The JSON body.
    pub body: JsonValue,
}

impl Document {
    /// Wrap a body, stamping both timestamps with the current time.
    #[must_use]
    pub fn new(body: JsonValue) -> Self {
        let now = now_rfc3339();
        Self { created_at: Some(now.clone()), updated_at: Some(now), body }
    }

    /// Wrap a body with explicit timestamps (fixtures, replication).
    #[must_use]
    pub fn with_timestamps(
        body: JsonValue,
        created_at: Option<String>,
        updated_at: Option<String>,
    ) -> Self {
        Self { created_at, updated_at, body }
    }

    /// Produce the updated revision of this document: new body, fresh
    /// `updated_at`, original `created_at`.
    #[must_use]
    pub fn updated(&self, body: JsonValue) -> Self {
        Self {
            created_at: self.created_at.clone(),
            updated_at: Some(now_rfc3339()),
            body,
        }
    }

    /// Serialize the envelope for the data table.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::InvalidDocument`] if the body cannot be
    /// serialized.
    pub fn to_bytes(&self) -> IndexResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| IndexError::InvalidDocument(e.to_string()))
    }

    /// Decode an envelope from the data table.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::InvalidDocument`] on malformed bytes.
    pub fn from_bytes(bytes: &[u8]) -> IndexResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| IndexError::InvalidDocument(e.to_string()))
    }

    /// Extract the primary-key tuple, typed by the schema.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::InvalidDocument`] if a key field is missing or
    /// null, or [`IndexError::SchemaMismatch`] on a type disagreement.
    pub fn primary_key(&self, schema: &CollectionSchema) -> IndexResult<Vec<FieldValue>> {
        schema
            .primary_key
            .iter()
            .map(|name| {
                let raw = self.body.get(name).ok_or_else(|| {
                    IndexError::InvalidDocument(format!("missing primary key field {name}"))
                })?;
                let ty = schema.leaf_type(name).ok_or_else(|| {
                    IndexError::InvalidSchema(format!("primary key field {name} has no type"))
                })?;
                let value = convert_scalar(name, ty, raw)?;
                if value.is_null() {
                    return Err(IndexError::InvalidDocument(format!(
                        "primary key field {name} is null"
                    )));
                }
                Ok(value)
            })
            .collect()
    }

    /// Look up the raw JSON value at a dotted path, if present.
    ///
    /// Used by residual filters; array segments are not traversed here, the
    /// caller handles element matching.
    #[must_use]
    pub fn value_at(&self, path: &str) -> Option<&JsonValue> {
        if path == CREATED_AT_FIELD || path == UPDATED_AT_FIELD {
            return None;
        }
        let mut current = &self.body;
        for segment in path.split('.') {
            current = current.get(segment)?;
        }
        Some(current)
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Canonicalise datetime text: well-formed RFC-3339 is rendered in UTC with
/// a fixed-width microsecond fraction, malformed text is kept verbatim and
/// ordered as an opaque string.
///
/// The width is load-bearing: canonical strings are compared byte-wise in
/// index keys, and only a fixed-width fraction keeps mixed-precision values
/// chronologically ordered (`10:00:00Z` would otherwise sort after
/// `10:00:00.500Z`, since `Z` is above `.`).
#[must_use]
pub fn canonicalize_datetime(raw: &str) -> String {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => dt.with_timezone(&Utc).to_rfc3339_opts(SecondsFormat::Micros, true),
        Err(_) => raw.to_owned(),
    }
}

/// Convert one JSON scalar into its schema-typed [`FieldValue`].
///
/// JSON `null` maps to [`FieldValue::Null`] regardless of the declared type.
/// Integers widen to doubles under a `number`-typed node; everything else is
/// strict.
///
/// # Errors
///
/// Returns [`IndexError::SchemaMismatch`] on a type disagreement.
pub fn convert_scalar(path: &str, ty: ScalarType, raw: &JsonValue) -> IndexResult<FieldValue> {
    if raw.is_null() {
        return Ok(FieldValue::Null);
    }
    let mismatch = || IndexError::schema_mismatch(path, ty.name(), json_type_name(raw));
    match ty {
        ScalarType::Bool => raw.as_bool().map(FieldValue::Bool).ok_or_else(mismatch),
        ScalarType::Int => raw.as_i64().map(FieldValue::Int).ok_or_else(mismatch),
        ScalarType::Double => raw.as_f64().map(FieldValue::Double).ok_or_else(mismatch),
        ScalarType::String => raw.as_str().map(FieldValue::from).ok_or_else(mismatch),
        ScalarType::DateTime => raw
            .as_str()
            .map(|s| FieldValue::DateTime(canonicalize_datetime(s)))
            .ok_or_else(mismatch),
        ScalarType::Bytes => {
            let text = raw.as_str().ok_or_else(mismatch)?;
            let bytes = BASE64.decode(text).map_err(|_| {
                IndexError::schema_mismatch(path, "base64", "unpadded or invalid text")
            })?;
            Ok(FieldValue::Bytes(bytes))
        }
    }
}

fn json_type_name(v: &JsonValue) -> &'static str {
    match v {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn envelope_roundtrip() {
        let doc = Document::with_timestamps(
            json!({"id": 1, "name": "a"}),
            Some("2023-01-16T12:55:17.304154Z".into()),
            Some("2023-01-16T12:55:17.304154Z".into()),
        );
        let bytes = doc.to_bytes().unwrap();
        assert_eq!(Document::from_bytes(&bytes).unwrap(), doc);
    }

    #[test]
    fn new_documents_are_stamped() {
        let doc = Document::new(json!({}));
        assert!(doc.created_at.is_some());
        assert_eq!(doc.created_at, doc.updated_at);
    }

    #[test]
    fn updated_keeps_created_at() {
        let doc = Document::with_timestamps(
            json!({"v": 1}),
            Some("2023-01-16T12:55:17.304154Z".into()),
            Some("2023-01-16T12:55:17.304154Z".into()),
        );
        let next = doc.updated(json!({"v": 2}));
        assert_eq!(next.created_at, doc.created_at);
        assert_ne!(next.updated_at, doc.updated_at);
    }

    #[test]
    fn datetime_canonicalisation() {
        // Microsecond UTC text is preserved.
        assert_eq!(
            canonicalize_datetime("2023-01-16T12:55:17.304154Z"),
            "2023-01-16T12:55:17.304154Z"
        );
        // Offsets are converted to UTC, fractions padded to fixed width.
        assert_eq!(
            canonicalize_datetime("2023-01-16T14:55:17+02:00"),
            "2023-01-16T12:55:17.000000Z"
        );
        // Malformed text is carried verbatim.
        assert_eq!(
            canonicalize_datetime("2015-12.22T17:42:34Z"),
            "2015-12.22T17:42:34Z"
        );
    }

    #[test]
    fn canonical_datetimes_order_across_precisions() {
        // A whole-second value must sort before a fractional value of the
        // same second; the fixed-width fraction is what guarantees it.
        let whole = canonicalize_datetime("2023-06-01T10:00:00Z");
        let fractional = canonicalize_datetime("2023-06-01T10:00:00.500000Z");
        let next = canonicalize_datetime("2023-06-01T10:00:01Z");
        assert_eq!(whole, "2023-06-01T10:00:00.000000Z");
        assert!(whole < fractional);
        assert!(fractional < next);
    }

    #[test]
    fn scalar_conversion() {
        assert_eq!(
            convert_scalar("f", ScalarType::Int, &json!(7)).unwrap(),
            FieldValue::Int(7)
        );
        // Integers widen under a number-typed node.
        assert_eq!(
            convert_scalar("f", ScalarType::Double, &json!(2)).unwrap(),
            FieldValue::Double(2.0)
        );
        assert_eq!(
            convert_scalar("f", ScalarType::Bytes, &json!("cGVlay1hLWJvbwo=")).unwrap(),
            FieldValue::Bytes(b"peek-a-boo\n".to_vec())
        );
        assert_eq!(
            convert_scalar("f", ScalarType::Bool, &JsonValue::Null).unwrap(),
            FieldValue::Null
        );
        assert!(convert_scalar("f", ScalarType::Int, &json!(1.5)).is_err());
        assert!(convert_scalar("f", ScalarType::Bool, &json!("true")).is_err());
        assert!(convert_scalar("f", ScalarType::Bytes, &json!("not base64!")).is_err());
    }

    #[test]
    fn primary_key_extraction() {
        let schema = CollectionSchema::from_json(
            br#"{
                "title": "t1",
                "properties": {
                    "tenant": {"type": "string"},
                    "id": {"type": "integer"}
                },
                "primary_key": ["tenant", "id"]
            }"#,
        )
        .unwrap();

        let doc = Document::new(json!({"tenant": "acme", "id": 7}));
        assert_eq!(
            doc.primary_key(&schema).unwrap(),
            vec![FieldValue::String("acme".into()), FieldValue::Int(7)]
        );

        let missing = Document::new(json!({"tenant": "acme"}));
        assert!(missing.primary_key(&schema).is_err());

        let null_key = Document::new(json!({"tenant": "acme", "id": null}));
        assert!(null_key.primary_key(&schema).is_err());
    }

    #[test]
    fn value_at_walks_nested_objects() {
        let doc = Document::new(json!({"a": {"b": {"c": 1}}}));
        assert_eq!(doc.value_at("a.b.c"), Some(&json!(1)));
        assert_eq!(doc.value_at("a.b.missing"), None);
    }
}
