//! The field walker: schema-guided projection of a document onto leaves.
//!
//! Walking yields one [`DocumentLeaf`] per indexable position:
//!
//! - the two auto-timestamp fields first, then top-level fields in schema
//!   order; nested objects contribute dotted path segments;
//! - arrays are element-major: every leaf of element 0, then element 1, each
//!   tagged with its `array_pos`;
//! - a schema-declared field absent from the document yields a null leaf at
//!   its path, so null, missing, and explicit-null documents are mutually
//!   queryable;
//! - an array nested inside another array collapses to a single synthetic
//!   stub leaf per outer position, preventing index key explosion while
//!   keeping presence queries answerable.
//!
//! The walker is a streaming iterator over an explicit frame stack, so its
//! memory use is bounded by the document, not the call stack.

use serde_json::Value as JsonValue;

use stratadb_core::encoding::ARRAY_STUB_FIELD;
use stratadb_core::FieldValue;

use crate::document::{
    canonicalize_datetime, convert_scalar, Document, CREATED_AT_FIELD, UPDATED_AT_FIELD,
};
use crate::error::{IndexError, IndexResult};
use crate::schema::{CollectionSchema, FieldKind};

/// One projected leaf of a document.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentLeaf {
    /// Dotted path; stub leaves end with [`ARRAY_STUB_FIELD`].
    pub path: String,
    /// The leaf payload.
    pub value: LeafValue,
    /// 0-origin position within the source array; 0 outside arrays.
    pub array_pos: u32,
}

/// Payload of a leaf.
#[derive(Debug, Clone, PartialEq)]
pub enum LeafValue {
    /// A scalar value (possibly null).
    Scalar(FieldValue),
    /// A nested-array stub.
    ArrayStub,
}

enum Frame<'a> {
    Meta {
        path: &'static str,
        value: Option<&'a str>,
    },
    Node {
        path: String,
        kind: &'a FieldKind,
        value: Option<&'a JsonValue>,
        pos: u32,
        in_array: bool,
    },
}

/// Streaming leaf iterator over one document.
pub struct LeafWalker<'a> {
    stack: Vec<Frame<'a>>,
}

/// Walk `doc` guided by `schema`.
#[must_use]
pub fn walk<'a>(schema: &'a CollectionSchema, doc: &'a Document) -> LeafWalker<'a> {
    let mut stack = Vec::with_capacity(schema.fields.len() + 2);
    for field in schema.fields.iter().rev() {
        stack.push(Frame::Node {
            path: field.name.clone(),
            kind: &field.kind,
            value: doc.body.get(&field.name),
            pos: 0,
            in_array: false,
        });
    }
    stack.push(Frame::Meta { path: UPDATED_AT_FIELD, value: doc.updated_at.as_deref() });
    stack.push(Frame::Meta { path: CREATED_AT_FIELD, value: doc.created_at.as_deref() });
    LeafWalker { stack }
}

impl LeafWalker<'_> {
    fn scalar(path: String, value: FieldValue, array_pos: u32) -> DocumentLeaf {
        DocumentLeaf { path, value: LeafValue::Scalar(value), array_pos }
    }
}

impl Iterator for LeafWalker<'_> {
    type Item = IndexResult<DocumentLeaf>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(frame) = self.stack.pop() {
            match frame {
                Frame::Meta { path, value } => {
                    let value = match value {
                        Some(raw) => FieldValue::DateTime(canonicalize_datetime(raw)),
                        None => FieldValue::Null,
                    };
                    return Some(Ok(Self::scalar(path.to_owned(), value, 0)));
                }

                Frame::Node { path, kind, value, pos, in_array } => match kind {
                    FieldKind::Scalar(ty) => {
                        let value = match value {
                            None => FieldValue::Null,
                            Some(raw) => match convert_scalar(&path, *ty, raw) {
                                Ok(v) => v,
                                Err(e) => return Some(Err(e)),
                            },
                        };
                        return Some(Ok(Self::scalar(path, value, pos)));
                    }

                    FieldKind::Object(fields) => {
                        let obj = match value {
                            None | Some(JsonValue::Null) => None,
                            Some(JsonValue::Object(map)) => Some(map),
                            Some(other) => {
                                return Some(Err(IndexError::schema_mismatch(
                                    &path,
                                    "object",
                                    json_kind(other),
                                )));
                            }
                        };
                        for field in fields.iter().rev() {
                            self.stack.push(Frame::Node {
                                path: format!("{path}.{}", field.name),
                                kind: &field.kind,
                                value: obj.and_then(|o| o.get(&field.name)),
                                pos,
                                in_array,
                            });
                        }
                    }

                    FieldKind::Array(item) => match value {
                        None | Some(JsonValue::Null) => {
                            let pos = if in_array { pos } else { 0 };
                            return Some(Ok(Self::scalar(path, FieldValue::Null, pos)));
                        }
                        Some(JsonValue::Array(elements)) => {
                            if in_array {
                                return Some(Ok(DocumentLeaf {
                                    path: format!("{path}.{ARRAY_STUB_FIELD}"),
                                    value: LeafValue::ArrayStub,
                                    array_pos: pos,
                                }));
                            }
                            for (i, element) in elements.iter().enumerate().rev() {
                                self.stack.push(Frame::Node {
                                    path: path.clone(),
                                    kind: item,
                                    value: Some(element),
                                    pos: i as u32,
                                    in_array: true,
                                });
                            }
                        }
                        Some(other) => {
                            return Some(Err(IndexError::schema_mismatch(
                                &path,
                                "array",
                                json_kind(other),
                            )));
                        }
                    },
                },
            }
        }
        None
    }
}

fn json_kind(v: &JsonValue) -> &'static str {
    match v {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
