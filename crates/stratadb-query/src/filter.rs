//! Predicate AST over document fields, parsed from the JSON filter shape.
//!
//! Leaf predicates are `$eq`, `$ne`, `$gt`, `$gte`, `$lt`, `$lte`;
//! connectives are `$and` and `$or`. A bare `{"field": value}` entry is
//! shorthand for `$eq`, and multiple entries in one object conjoin.
//!
//! Literals are typed against the collection schema at parse time, so the
//! planner compares values the same way the index encodes them.

use serde_json::Value as JsonValue;

use stratadb_core::FieldValue;
use stratadb_index::document::{
    convert_scalar, Document, CREATED_AT_FIELD, UPDATED_AT_FIELD,
};
use stratadb_index::schema::{CollectionSchema, ScalarType};
use stratadb_index::walker::{walk, LeafValue};

use crate::error::{QueryError, QueryResult};

/// Comparison operator of a leaf predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    /// Equal.
    Eq,
    /// Not equal.
    Ne,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Gte,
    /// Less than.
    Lt,
    /// Less than or equal.
    Lte,
}

impl CmpOp {
    fn parse(token: &str) -> Option<Self> {
        match token {
            "$eq" => Some(Self::Eq),
            "$ne" => Some(Self::Ne),
            "$gt" => Some(Self::Gt),
            "$gte" => Some(Self::Gte),
            "$lt" => Some(Self::Lt),
            "$lte" => Some(Self::Lte),
            _ => None,
        }
    }
}

/// One leaf predicate: `field <op> value`.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldPredicate {
    /// Dotted field path.
    pub field: String,
    /// Comparison operator.
    pub op: CmpOp,
    /// Typed literal.
    pub value: FieldValue,
}

impl FieldPredicate {
    /// Whether one document value satisfies this predicate.
    #[must_use]
    pub fn satisfied_by(&self, value: &FieldValue) -> bool {
        let ordering = value.cmp_semantic(&self.value);
        match self.op {
            CmpOp::Eq => ordering.is_eq(),
            CmpOp::Ne => ordering.is_ne(),
            CmpOp::Gt => ordering.is_gt(),
            CmpOp::Gte => ordering.is_ge(),
            CmpOp::Lt => ordering.is_lt(),
            CmpOp::Lte => ordering.is_le(),
        }
    }
}

/// A boolean predicate tree.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterNode {
    /// Conjunction; empty matches everything.
    And(Vec<FilterNode>),
    /// Disjunction; empty matches nothing.
    Or(Vec<FilterNode>),
    /// Leaf comparison.
    Predicate(FieldPredicate),
}

impl FilterNode {
    /// A filter matching every document.
    #[must_use]
    pub fn match_all() -> Self {
        Self::And(Vec::new())
    }
}

/// Parse a JSON filter document against a schema.
///
/// # Errors
///
/// Returns [`QueryError::InvalidFilter`] on malformed shapes and
/// [`QueryError::UnknownField`] for fields the schema does not declare.
pub fn parse_filter(schema: &CollectionSchema, json: &JsonValue) -> QueryResult<FilterNode> {
    let object = json
        .as_object()
        .ok_or_else(|| QueryError::InvalidFilter("filter must be an object".into()))?;

    let mut nodes = Vec::with_capacity(object.len());
    for (key, value) in object {
        match key.as_str() {
            "$and" => nodes.push(FilterNode::And(parse_branches(schema, key, value)?)),
            "$or" => nodes.push(FilterNode::Or(parse_branches(schema, key, value)?)),
            field => nodes.extend(parse_field(schema, field, value)?),
        }
    }
    Ok(match nodes.len() {
        1 => nodes.into_iter().next().unwrap_or_else(FilterNode::match_all),
        _ => FilterNode::And(nodes),
    })
}

fn parse_branches(
    schema: &CollectionSchema,
    connective: &str,
    value: &JsonValue,
) -> QueryResult<Vec<FilterNode>> {
    let branches = value.as_array().ok_or_else(|| {
        QueryError::InvalidFilter(format!("{connective} expects an array of filters"))
    })?;
    branches.iter().map(|b| parse_filter(schema, b)).collect()
}

fn parse_field(
    schema: &CollectionSchema,
    field: &str,
    value: &JsonValue,
) -> QueryResult<Vec<FilterNode>> {
    let ty = field_type(schema, field)?;

    // `{"field": {"$op": v, ...}}` versus the `$eq` shorthand. An object
    // without operator keys is not a valid literal (objects are not scalars).
    if let Some(ops) = value.as_object() {
        if ops.keys().any(|k| k.starts_with('$')) {
            return ops
                .iter()
                .map(|(op_token, literal)| {
                    let op = CmpOp::parse(op_token).ok_or_else(|| {
                        QueryError::InvalidFilter(format!("unknown operator {op_token}"))
                    })?;
                    let value = convert_scalar(field, ty, literal)?;
                    Ok(FilterNode::Predicate(FieldPredicate {
                        field: field.to_owned(),
                        op,
                        value,
                    }))
                })
                .collect();
        }
        return Err(QueryError::InvalidFilter(format!(
            "field {field} compared against a non-scalar"
        )));
    }

    let value = convert_scalar(field, ty, value)?;
    Ok(vec![FilterNode::Predicate(FieldPredicate {
        field: field.to_owned(),
        op: CmpOp::Eq,
        value,
    })])
}

/// Resolve the scalar type a filter literal on `field` must convert to.
pub(crate) fn field_type(schema: &CollectionSchema, field: &str) -> QueryResult<ScalarType> {
    if field == CREATED_AT_FIELD || field == UPDATED_AT_FIELD {
        return Ok(ScalarType::DateTime);
    }
    schema
        .leaf_type(field)
        .ok_or_else(|| QueryError::UnknownField(field.to_owned()))
}

/// Evaluate a filter against a document (the residual path).
///
/// A leaf predicate is satisfied when any walker leaf at its path satisfies
/// it; absent fields evaluate as null, which keeps `$eq: null` consistent
/// between index scans and residual filtering.
#[must_use]
pub fn matches(filter: &FilterNode, schema: &CollectionSchema, doc: &Document) -> bool {
    match filter {
        FilterNode::And(children) => children.iter().all(|c| matches(c, schema, doc)),
        FilterNode::Or(children) => children.iter().any(|c| matches(c, schema, doc)),
        FilterNode::Predicate(pred) => walk(schema, doc)
            .flatten()
            .filter(|leaf| leaf.path == pred.field)
            .any(|leaf| match &leaf.value {
                LeafValue::Scalar(value) => pred.satisfied_by(value),
                LeafValue::ArrayStub => false,
            }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn schema() -> CollectionSchema {
        CollectionSchema::from_json(
            br#"{
                "title": "t1",
                "properties": {
                    "pkey_int": {"type": "integer"},
                    "int_value": {"type": "integer"},
                    "string_value": {"type": "string"},
                    "bool_value": {"type": "boolean"},
                    "double_value": {"type": "number"},
                    "date_time_value": {"type": "string", "format": "date-time"},
                    "arr": {"type": "array", "items": {"type": "integer"}}
                },
                "primary_key": ["pkey_int"]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn shorthand_equality() {
        let filter = parse_filter(&schema(), &json!({"int_value": 10})).unwrap();
        assert_eq!(
            filter,
            FilterNode::Predicate(FieldPredicate {
                field: "int_value".into(),
                op: CmpOp::Eq,
                value: FieldValue::Int(10),
            })
        );
    }

    #[test]
    fn multiple_entries_conjoin() {
        let filter =
            parse_filter(&schema(), &json!({"bool_value": false, "int_value": 3})).unwrap();
        match filter {
            FilterNode::And(children) => assert_eq!(children.len(), 2),
            other => panic!("expected And, got {other:?}"),
        }
    }

    #[test]
    fn operators_and_connectives() {
        let filter = parse_filter(
            &schema(),
            &json!({"$and": [
                {"int_value": {"$gte": 30}},
                {"int_value": {"$lte": 100}}
            ]}),
        )
        .unwrap();
        match filter {
            FilterNode::And(children) => assert_eq!(children.len(), 2),
            other => panic!("expected And, got {other:?}"),
        }

        let filter = parse_filter(
            &schema(),
            &json!({"$or": [{"int_value": 1}, {"bool_value": true}]}),
        )
        .unwrap();
        assert!(matches!(filter, FilterNode::Or(ref c) if c.len() == 2));
    }

    #[test]
    fn literals_are_schema_typed() {
        // An integer literal under a number-typed field widens to a double.
        let filter = parse_filter(&schema(), &json!({"double_value": {"$gte": 5}})).unwrap();
        assert_eq!(
            filter,
            FilterNode::Predicate(FieldPredicate {
                field: "double_value".into(),
                op: CmpOp::Gte,
                value: FieldValue::Double(5.0),
            })
        );

        // Null literals are legal on any field.
        let filter = parse_filter(&schema(), &json!({"int_value": {"$eq": null}})).unwrap();
        assert_eq!(
            filter,
            FilterNode::Predicate(FieldPredicate {
                field: "int_value".into(),
                op: CmpOp::Eq,
                value: FieldValue::Null,
            })
        );
    }

    #[test]
    fn unknown_fields_and_operators_fail() {
        assert!(matches!(
            parse_filter(&schema(), &json!({"nope": 1})),
            Err(QueryError::UnknownField(_))
        ));
        assert!(matches!(
            parse_filter(&schema(), &json!({"int_value": {"$near": 1}})),
            Err(QueryError::InvalidFilter(_))
        ));
        assert!(matches!(
            parse_filter(&schema(), &json!([1, 2])),
            Err(QueryError::InvalidFilter(_))
        ));
    }

    #[test]
    fn residual_matches_scalars_and_arrays() {
        let schema = schema();
        let doc = Document::new(json!({
            "pkey_int": 1, "int_value": 10, "string_value": "a",
            "bool_value": true, "double_value": 10.01, "arr": [4, 5]
        }));

        let hit = parse_filter(&schema, &json!({"arr": 5})).unwrap();
        assert!(matches(&hit, &schema, &doc));

        let miss = parse_filter(&schema, &json!({"arr": 6})).unwrap();
        assert!(!matches(&miss, &schema, &doc));

        let conj =
            parse_filter(&schema, &json!({"int_value": 10, "bool_value": true})).unwrap();
        assert!(matches(&conj, &schema, &doc));
    }

    #[test]
    fn residual_null_matches_missing_fields() {
        let schema = schema();
        let doc = Document::new(json!({"pkey_int": 1}));
        let filter = parse_filter(&schema, &json!({"int_value": {"$eq": null}})).unwrap();
        assert!(matches(&filter, &schema, &doc));

        // $gt null excludes the null leaf.
        let gt = parse_filter(&schema, &json!({"int_value": {"$gt": null}})).unwrap();
        assert!(!matches(&gt, &schema, &doc));
    }

    #[test]
    fn residual_string_comparison_is_collation_order() {
        let schema = schema();
        let doc = Document::new(json!({"pkey_int": 1, "string_value": "G"}));
        let filter = parse_filter(&schema, &json!({"string_value": {"$gt": "B"}})).unwrap();
        assert!(matches(&filter, &schema, &doc));
        let filter = parse_filter(&schema, &json!({"string_value": {"$lt": "z"}})).unwrap();
        assert!(matches(&filter, &schema, &doc));
    }
}
