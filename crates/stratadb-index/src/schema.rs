//! Typed field trees describing a collection's document shape.
//!
//! Schema parsing proper lives outside the index subsystem; what the walker
//! and planner need is the typed tree this module defines, plus a compact
//! loader for the JSON request-schema shape
//! (`{"title": ..., "properties": {...}, "primary_key": [...]}`) used by the
//! fixtures and the catalog layer.

use serde_json::Value as JsonValue;

use crate::error::{IndexError, IndexResult};

/// Scalar leaf types a schema can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    /// Boolean.
    Bool,
    /// 64-bit signed integer.
    Int,
    /// 64-bit floating point number.
    Double,
    /// UTF-8 string.
    String,
    /// RFC-3339 datetime carried as a string.
    DateTime,
    /// Binary data carried as a base64 string.
    Bytes,
}

impl ScalarType {
    /// Short name for error messages.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bool => "boolean",
            Self::Int => "integer",
            Self::Double => "number",
            Self::String => "string",
            Self::DateTime => "date-time",
            Self::Bytes => "byte",
        }
    }
}

/// Shape of one schema node.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    /// A scalar leaf.
    Scalar(ScalarType),
    /// An array of the given item shape.
    Array(Box<FieldKind>),
    /// A nested object with ordered fields.
    Object(Vec<FieldSchema>),
}

/// A named schema node.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSchema {
    /// Field name (one dotted-path segment).
    pub name: String,
    /// Shape of the field.
    pub kind: FieldKind,
    /// Whether the field is annotated `index: true`.
    pub index: bool,
}

impl FieldSchema {
    /// Create a non-indexed field.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self { name: name.into(), kind, index: false }
    }

    /// Mark the field as indexed.
    #[must_use]
    pub fn indexed(mut self) -> Self {
        self.index = true;
        self
    }
}

/// The typed field tree of one collection.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionSchema {
    /// Collection name.
    pub name: String,
    /// Top-level fields in declaration order.
    pub fields: Vec<FieldSchema>,
    /// Names of the primary-key fields, in tuple order.
    pub primary_key: Vec<String>,
}

impl CollectionSchema {
    /// Create a schema, validating that primary-key fields exist and are
    /// scalars.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::InvalidSchema`] on an empty or dangling primary
    /// key.
    pub fn new(
        name: impl Into<String>,
        fields: Vec<FieldSchema>,
        primary_key: Vec<String>,
    ) -> IndexResult<Self> {
        if primary_key.is_empty() {
            return Err(IndexError::InvalidSchema("primary key cannot be empty".into()));
        }
        for pk in &primary_key {
            match fields.iter().find(|f| &f.name == pk) {
                Some(FieldSchema { kind: FieldKind::Scalar(_), .. }) => {}
                Some(_) => {
                    return Err(IndexError::InvalidSchema(format!(
                        "primary key field {pk} must be a scalar"
                    )));
                }
                None => {
                    return Err(IndexError::InvalidSchema(format!(
                        "primary key field {pk} is not declared"
                    )));
                }
            }
        }
        Ok(Self { name: name.into(), fields, primary_key })
    }

    /// Load a schema from the JSON request-schema shape.
    ///
    /// Recognised keys: `title`, `properties` (ordered), per-property `type`,
    /// `format` (`date-time`, `byte`, `uuid`), `items`, nested `properties`,
    /// `index`, and top-level `primary_key`.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::InvalidSchema`] on malformed input.
    pub fn from_json(bytes: &[u8]) -> IndexResult<Self> {
        let root: JsonValue = serde_json::from_slice(bytes)
            .map_err(|e| IndexError::InvalidSchema(format!("not valid JSON: {e}")))?;
        let title = root
            .get("title")
            .and_then(JsonValue::as_str)
            .ok_or_else(|| IndexError::InvalidSchema("missing title".into()))?;
        let fields = parse_properties(root.get("properties"))?;
        let primary_key = root
            .get("primary_key")
            .and_then(JsonValue::as_array)
            .map(|keys| {
                keys.iter()
                    .map(|k| {
                        k.as_str().map(str::to_owned).ok_or_else(|| {
                            IndexError::InvalidSchema("primary_key entries must be strings".into())
                        })
                    })
                    .collect::<IndexResult<Vec<_>>>()
            })
            .transpose()?
            .unwrap_or_default();
        Self::new(title, fields, primary_key)
    }

    /// Look up a top-level field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Resolve the scalar type at a dotted leaf path, looking through arrays.
    ///
    /// Returns `None` for unknown paths and for synthetic stub segments.
    #[must_use]
    pub fn leaf_type(&self, path: &str) -> Option<ScalarType> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut kind = &self.field(first)?.kind;
        loop {
            kind = match kind {
                FieldKind::Array(item) => item,
                other => other,
            };
            match kind {
                FieldKind::Scalar(ty) => {
                    return if segments.next().is_none() { Some(*ty) } else { None };
                }
                FieldKind::Object(fields) => {
                    let segment = segments.next()?;
                    kind = &fields.iter().find(|f| f.name == segment)?.kind;
                }
                FieldKind::Array(_) => {
                    // Array of arrays: only the stub segment can follow, and
                    // stubs have no scalar type.
                    return None;
                }
            }
        }
    }

    /// Every leaf path the walker can produce under one top-level field.
    ///
    /// Used to enumerate the key prefixes owned by that field's index.
    #[must_use]
    pub fn leaf_paths(field: &FieldSchema) -> Vec<String> {
        let mut paths = Vec::new();
        collect_leaf_paths(&field.name, &field.kind, false, &mut paths);
        paths.dedup();
        paths
    }
}

fn collect_leaf_paths(path: &str, kind: &FieldKind, in_array: bool, out: &mut Vec<String>) {
    match kind {
        FieldKind::Scalar(_) => out.push(path.to_owned()),
        FieldKind::Object(fields) => {
            for field in fields {
                collect_leaf_paths(&format!("{path}.{}", field.name), &field.kind, in_array, out);
            }
        }
        FieldKind::Array(item) => {
            // An absent array leaves a null at the array path itself.
            out.push(path.to_owned());
            if in_array {
                out.push(stub_path(path));
                return;
            }
            match item.as_ref() {
                FieldKind::Scalar(_) => {}
                FieldKind::Object(fields) => {
                    for field in fields {
                        collect_leaf_paths(
                            &format!("{path}.{}", field.name),
                            &field.kind,
                            true,
                            out,
                        );
                    }
                }
                FieldKind::Array(_) => out.push(stub_path(path)),
            }
        }
    }
}

fn stub_path(path: &str) -> String {
    format!("{path}.{}", stratadb_core::encoding::ARRAY_STUB_FIELD)
}

fn parse_properties(properties: Option<&JsonValue>) -> IndexResult<Vec<FieldSchema>> {
    let map = properties
        .and_then(JsonValue::as_object)
        .ok_or_else(|| IndexError::InvalidSchema("missing properties".into()))?;
    map.iter()
        .map(|(name, node)| {
            let kind = parse_kind(name, node)?;
            let index = node.get("index").and_then(JsonValue::as_bool).unwrap_or(false);
            Ok(FieldSchema { name: name.clone(), kind, index })
        })
        .collect()
}

fn parse_kind(name: &str, node: &JsonValue) -> IndexResult<FieldKind> {
    let ty = node
        .get("type")
        .and_then(JsonValue::as_str)
        .ok_or_else(|| IndexError::InvalidSchema(format!("field {name} has no type")))?;
    match ty {
        "boolean" => Ok(FieldKind::Scalar(ScalarType::Bool)),
        "integer" => Ok(FieldKind::Scalar(ScalarType::Int)),
        "number" => Ok(FieldKind::Scalar(ScalarType::Double)),
        "string" => {
            let format = node.get("format").and_then(JsonValue::as_str);
            Ok(FieldKind::Scalar(match format {
                Some("date-time") => ScalarType::DateTime,
                Some("byte") => ScalarType::Bytes,
                _ => ScalarType::String,
            }))
        }
        "array" => {
            let items = node
                .get("items")
                .ok_or_else(|| IndexError::InvalidSchema(format!("array {name} has no items")))?;
            Ok(FieldKind::Array(Box::new(parse_kind(name, items)?)))
        }
        "object" => Ok(FieldKind::Object(parse_properties(node.get("properties"))?)),
        other => Err(IndexError::InvalidSchema(format!("field {name} has unknown type {other}"))),
    }
}
