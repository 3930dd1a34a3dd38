//! The query planner: predicate trees in, index range plans out.
//!
//! Selection follows three rules, in order:
//!
//! 1. a single-key sort on an actively indexed field wins: the plan scans
//!    that field's index in the requested direction (the full field range if
//!    the filter does not constrain it) and everything else is residual;
//! 2. among predicate fields with an active index, equality beats range
//!    (narrower), and ties break lexicographically on field name so plans
//!    are deterministic;
//! 3. with no usable index the plan falls back to a primary scan with the
//!    whole filter as residual, which is also where queries land while an
//!    index is still `Inactive` or `Building`.
//!
//! A conjunction's range predicates on the chosen field fold into one
//! `(low, high)` intersection; predicates the range does not fully cover
//! stay in the residual filter. Equality on a string longer than the
//! collation truncation bound keeps a residual exactness check, since
//! distinct long strings can share an encoded key.

use std::collections::BTreeMap;

use serde_json::Value as JsonValue;
use tracing::debug;

use stratadb_core::encoding::collation::is_truncated;
use stratadb_core::FieldValue;
use stratadb_index::metadata::{CollectionIndexes, IndexState};
use stratadb_index::IndexerConfig;

use crate::error::{QueryError, QueryResult};
use crate::filter::{CmpOp, FieldPredicate, FilterNode};
use crate::plan::{IndexScan, KeyRange, QueryPlan, ReadType, SortKey, SortOrder};

/// Parse the JSON sort shape `[{"field": "$asc"|"$desc"}, ...]`.
///
/// # Errors
///
/// Returns [`QueryError::InvalidSort`] on malformed input.
pub fn parse_sort(json: Option<&JsonValue>) -> QueryResult<Vec<SortKey>> {
    let Some(json) = json else { return Ok(Vec::new()) };
    let entries = json
        .as_array()
        .ok_or_else(|| QueryError::InvalidSort("sort must be an array".into()))?;
    entries
        .iter()
        .map(|entry| {
            let (field, dir) = entry
                .as_object()
                .filter(|o| o.len() == 1)
                .and_then(|o| o.iter().next())
                .ok_or_else(|| {
                    QueryError::InvalidSort("each sort entry must be a single-field object".into())
                })?;
            let order = match dir.as_str() {
                Some("$asc") => SortOrder::Asc,
                Some("$desc") => SortOrder::Desc,
                _ => {
                    return Err(QueryError::InvalidSort(format!(
                        "sort direction for {field} must be $asc or $desc"
                    )));
                }
            };
            Ok(SortKey { field: field.clone(), order })
        })
        .collect()
}

#[derive(Debug, Default)]
struct FieldBounds {
    eq: Option<FieldValue>,
    low: Option<(FieldValue, bool)>,
    high: Option<(FieldValue, bool)>,
}

impl FieldBounds {
    fn fold(&mut self, pred: &FieldPredicate) {
        match pred.op {
            CmpOp::Eq => {
                if self.eq.is_none() {
                    self.eq = Some(pred.value.clone());
                }
            }
            CmpOp::Gt | CmpOp::Gte => {
                let candidate = (pred.value.clone(), pred.op == CmpOp::Gte);
                self.low = Some(match self.low.take() {
                    Some(existing) => tighter_low(existing, candidate),
                    None => candidate,
                });
            }
            CmpOp::Lt | CmpOp::Lte => {
                let candidate = (pred.value.clone(), pred.op == CmpOp::Lte);
                self.high = Some(match self.high.take() {
                    Some(existing) => tighter_high(existing, candidate),
                    None => candidate,
                });
            }
            CmpOp::Ne => {}
        }
    }

    fn has_range(&self) -> bool {
        self.low.is_some() || self.high.is_some()
    }
}

fn tighter_low(
    a: (FieldValue, bool),
    b: (FieldValue, bool),
) -> (FieldValue, bool) {
    match a.0.cmp_semantic(&b.0) {
        std::cmp::Ordering::Less => b,
        std::cmp::Ordering::Greater => a,
        // Same value: exclusive is tighter.
        std::cmp::Ordering::Equal => {
            if a.1 && !b.1 {
                b
            } else {
                a
            }
        }
    }
}

fn tighter_high(
    a: (FieldValue, bool),
    b: (FieldValue, bool),
) -> (FieldValue, bool) {
    match a.0.cmp_semantic(&b.0) {
        std::cmp::Ordering::Less => a,
        std::cmp::Ordering::Greater => b,
        std::cmp::Ordering::Equal => {
            if a.1 && !b.1 {
                b
            } else {
                a
            }
        }
    }
}

/// Plans queries over one collection.
pub struct QueryPlanner<'c> {
    coll: &'c CollectionIndexes,
    config: &'c IndexerConfig,
}

impl<'c> QueryPlanner<'c> {
    /// Create a planner over a collection descriptor.
    #[must_use]
    pub fn new(coll: &'c CollectionIndexes, config: &'c IndexerConfig) -> Self {
        Self { coll, config }
    }

    fn has_active_index(&self, field: &str) -> bool {
        self.coll
            .meta_for_path(field)
            .is_some_and(|m| m.state == IndexState::Active)
    }

    /// Compile a filter and sort into an executable plan.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Codec`] if a bound value cannot be encoded.
    pub fn plan(&self, filter: &FilterNode, sort: &[SortKey]) -> QueryResult<QueryPlan> {
        // A fully disjunctive filter becomes a multi-range union when every
        // branch is independently indexable.
        if let FilterNode::Or(branches) = filter {
            if sort.is_empty() && !branches.is_empty() {
                if let Some(scans) = self.union_scans(branches) {
                    debug!(branches = scans.len(), "planned multi-range union");
                    return Ok(QueryPlan {
                        read_type: ReadType::SecondaryIndex,
                        scans,
                        residual: Some(filter.clone()),
                        reverse: false,
                        memory_sort: None,
                    });
                }
            }
        }

        let mut predicates = Vec::new();
        let has_or = collect_conjunction(filter, &mut predicates);
        let bounds = self.fold_bounds(&predicates);

        // Rule 1: single-key sort pushdown.
        if let [sort_key] = sort {
            if self.has_active_index(&sort_key.field) {
                return self.sorted_plan(filter, sort_key, &predicates, &bounds, has_or);
            }
        }
        let memory_sort = if sort.is_empty() { None } else { Some(sort.to_vec()) };

        // Rule 2: equality first, then ranges; BTreeMap iteration order gives
        // the lexicographic tie-break, two-sided ranges beat one-sided ones.
        let mut chosen: Option<(&String, &FieldBounds)> = None;
        for (field, field_bounds) in &bounds {
            if field_bounds.eq.is_some() {
                chosen = Some((field, field_bounds));
                break;
            }
        }
        if chosen.is_none() {
            let mut best_score = 0;
            for (field, field_bounds) in &bounds {
                let score = usize::from(field_bounds.low.is_some())
                    + usize::from(field_bounds.high.is_some());
                if score > best_score {
                    best_score = score;
                    chosen = Some((field, field_bounds));
                }
            }
        }

        let Some((field, field_bounds)) = chosen else {
            // Rule 3: nothing indexable.
            return Ok(QueryPlan::primary(residual_of(filter), memory_sort));
        };
        let field = field.clone();

        let range = range_of(field_bounds);
        let residual = self.residual_for(filter, &predicates, &field, &range, has_or);
        Ok(QueryPlan {
            read_type: ReadType::SecondaryIndex,
            scans: vec![IndexScan { field, range }],
            residual,
            reverse: false,
            memory_sort,
        })
    }

    fn sorted_plan(
        &self,
        filter: &FilterNode,
        sort_key: &SortKey,
        predicates: &[FieldPredicate],
        bounds: &BTreeMap<String, FieldBounds>,
        has_or: bool,
    ) -> QueryResult<QueryPlan> {
        let field = sort_key.field.clone();
        let range = match bounds.get(&field) {
            Some(b) => range_of(b),
            None => KeyRange::Range { low: None, high: None },
        };
        let residual = self.residual_for(filter, predicates, &field, &range, has_or);
        Ok(QueryPlan {
            read_type: ReadType::SecondaryIndex,
            scans: vec![IndexScan { field, range }],
            residual,
            reverse: sort_key.order == SortOrder::Desc,
            memory_sort: None,
        })
    }

    fn fold_bounds(&self, predicates: &[FieldPredicate]) -> BTreeMap<String, FieldBounds> {
        let mut bounds: BTreeMap<String, FieldBounds> = BTreeMap::new();
        for pred in predicates {
            if !self.has_active_index(&pred.field) {
                continue;
            }
            bounds.entry(pred.field.clone()).or_default().fold(pred);
        }
        bounds.retain(|_, b| b.eq.is_some() || b.has_range());
        bounds
    }

    fn residual_for(
        &self,
        filter: &FilterNode,
        predicates: &[FieldPredicate],
        chosen: &str,
        range: &KeyRange,
        has_or: bool,
    ) -> Option<FilterNode> {
        if has_or {
            // Disjunctions inside a conjunction are evaluated wholesale.
            return Some(filter.clone());
        }
        let uncovered: Vec<FilterNode> = predicates
            .iter()
            .filter(|p| !self.covers(p, chosen, range))
            .map(|p| FilterNode::Predicate(p.clone()))
            .collect();
        match uncovered.len() {
            0 => None,
            1 => uncovered.into_iter().next(),
            _ => Some(FilterNode::And(uncovered)),
        }
    }

    fn covers(&self, pred: &FieldPredicate, chosen: &str, range: &KeyRange) -> bool {
        if pred.field != chosen {
            return false;
        }
        match (pred.op, range) {
            // The emitted range is the intersection of every range predicate
            // on the chosen field; an equality point covers none of them.
            (CmpOp::Gt | CmpOp::Gte | CmpOp::Lt | CmpOp::Lte, KeyRange::Range { .. }) => true,
            // An equality predicate is covered only by its own point, and a
            // truncated string point needs the residual exactness check.
            (CmpOp::Eq, KeyRange::Eq(point)) => {
                pred.value.eq_semantic(point)
                    && !matches!(&pred.value, FieldValue::String(s)
                        if is_truncated(s, self.config.string_key_max_bytes))
            }
            _ => false,
        }
    }

    fn union_scans(&self, branches: &[FilterNode]) -> Option<Vec<IndexScan>> {
        let mut scans = Vec::with_capacity(branches.len());
        for branch in branches {
            let mut predicates = Vec::new();
            if collect_conjunction(branch, &mut predicates) {
                return None;
            }
            let bounds = self.fold_bounds(&predicates);
            // Each branch needs a viable range of its own; the union's
            // residual re-checks the full disjunction, so any constrained
            // indexed field of the branch gives a sound superset scan.
            let (field, field_bounds) = bounds
                .iter()
                .find(|(_, b)| b.eq.is_some())
                .or_else(|| bounds.iter().next())?;
            let range = range_of(field_bounds);
            scans.push(IndexScan { field: field.clone(), range });
        }
        Some(scans)
    }
}

/// Collect the conjunctive predicates of a filter; returns `true` if the
/// tree contains a disjunction (which contributes no bounds).
fn collect_conjunction(filter: &FilterNode, out: &mut Vec<FieldPredicate>) -> bool {
    match filter {
        FilterNode::Predicate(pred) => {
            out.push(pred.clone());
            false
        }
        FilterNode::And(children) => {
            let mut has_or = false;
            for child in children {
                has_or |= collect_conjunction(child, out);
            }
            has_or
        }
        FilterNode::Or(_) => true,
    }
}

fn range_of(bounds: &FieldBounds) -> KeyRange {
    if let Some(eq) = &bounds.eq {
        KeyRange::Eq(eq.clone())
    } else {
        KeyRange::Range { low: bounds.low.clone(), high: bounds.high.clone() }
    }
}

fn residual_of(filter: &FilterNode) -> Option<FilterNode> {
    match filter {
        FilterNode::And(children) if children.is_empty() => None,
        other => Some(other.clone()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use stratadb_index::schema::CollectionSchema;
    use stratadb_index::CollectionIndexes;

    use super::*;
    use crate::filter::parse_filter;
    use crate::plan::MAX_SENTINEL;

    fn setup() -> (CollectionIndexes, IndexerConfig) {
        let schema = CollectionSchema::from_json(
            br#"{
                "title": "t1",
                "properties": {
                    "pkey_int": {"type": "integer"},
                    "int_value": {"type": "integer"},
                    "string_value": {"type": "string"},
                    "bool_value": {"type": "boolean"},
                    "double_value": {"type": "number"},
                    "date_time_value": {"type": "string", "format": "date-time"}
                },
                "primary_key": ["pkey_int"]
            }"#,
        )
        .unwrap();
        let config = IndexerConfig::new().index_all(true);
        let coll = CollectionIndexes::new(schema, "t1", "sidx1", "meta1", &config);
        (coll, config)
    }

    fn explain_for(filter: serde_json::Value, sort: Option<serde_json::Value>) -> crate::plan::Explain {
        let (coll, config) = setup();
        let planner = QueryPlanner::new(&coll, &config);
        let filter = parse_filter(&coll.schema, &filter).unwrap();
        let sort = parse_sort(sort.as_ref()).unwrap();
        planner.plan(&filter, &sort).unwrap().explain()
    }

    #[test]
    fn equality_produces_point_range() {
        let explain = explain_for(json!({"int_value": 10}), None);
        assert_eq!(explain.read_type, "secondary index");
        assert_eq!(explain.field, "int_value");
        assert_eq!(explain.key_range, vec!["10".to_owned()]);
    }

    #[test]
    fn equality_ties_break_on_field_name() {
        let explain = explain_for(json!({"int_value": 30, "bool_value": false}), None);
        assert_eq!(explain.field, "bool_value");
        assert_eq!(explain.key_range, vec!["false".to_owned()]);
    }

    #[test]
    fn equality_beats_range() {
        let explain =
            explain_for(json!({"int_value": 1, "double_value": {"$gte": 5}}), None);
        assert_eq!(explain.field, "int_value");
        assert_eq!(explain.key_range, vec!["1".to_owned()]);
    }

    #[test]
    fn conjunctive_ranges_fold() {
        let explain = explain_for(
            json!({"$and": [
                {"int_value": {"$gte": 30}},
                {"int_value": {"$lte": 100}}
            ]}),
            None,
        );
        assert_eq!(explain.key_range, vec!["30".to_owned(), "100".to_owned()]);
    }

    #[test]
    fn open_ends_use_sentinels() {
        let explain = explain_for(json!({"int_value": {"$gt": 0}}), None);
        assert_eq!(explain.key_range, vec!["0".to_owned(), MAX_SENTINEL.to_owned()]);

        let explain = explain_for(json!({"bool_value": {"$lte": false}}), None);
        assert_eq!(explain.key_range, vec!["null".to_owned(), "false".to_owned()]);
    }

    #[test]
    fn sort_field_takes_over_the_scan() {
        let explain = explain_for(
            json!({"int_value": {"$gt": 0}}),
            Some(json!([{"double_value": "$desc"}])),
        );
        assert_eq!(explain.field, "double_value");
        assert_eq!(explain.key_range, vec!["null".to_owned(), MAX_SENTINEL.to_owned()]);
    }

    #[test]
    fn sort_on_filtered_field_keeps_bounds() {
        let (coll, config) = setup();
        let planner = QueryPlanner::new(&coll, &config);
        let filter = parse_filter(&coll.schema, &json!({"int_value": {"$gt": 1}})).unwrap();
        let sort = parse_sort(Some(&json!([{"int_value": "$desc"}]))).unwrap();
        let plan = planner.plan(&filter, &sort).unwrap();
        assert!(plan.reverse);
        assert!(plan.residual.is_none());
        assert_eq!(plan.explain().key_range, vec!["1".to_owned(), MAX_SENTINEL.to_owned()]);
    }

    #[test]
    fn eq_and_range_on_same_field_keep_range_residual() {
        let (coll, config) = setup();
        let planner = QueryPlanner::new(&coll, &config);
        let filter = parse_filter(
            &coll.schema,
            &json!({"int_value": 5, "int_value2": null}),
        );
        // Unknown field errors at parse time, not plan time.
        assert!(filter.is_err());

        let filter = parse_filter(
            &coll.schema,
            &json!({"$and": [{"int_value": 5}, {"int_value": {"$gt": 1}}]}),
        )
        .unwrap();
        let plan = planner.plan(&filter, &[]).unwrap();
        assert_eq!(plan.explain().key_range, vec!["5".to_owned()]);
        // The range predicate is not subsumed by the equality point.
        assert!(plan.residual.is_some());
    }

    #[test]
    fn unindexed_fields_fall_back_to_primary() {
        let schema = CollectionSchema::from_json(
            br#"{
                "title": "t1",
                "properties": {
                    "pkey_int": {"type": "integer"},
                    "plain": {"type": "string"}
                },
                "primary_key": ["pkey_int"]
            }"#,
        )
        .unwrap();
        let config = IndexerConfig::new();
        let coll = CollectionIndexes::new(schema, "t1", "sidx1", "meta1", &config);
        let planner = QueryPlanner::new(&coll, &config);
        let filter = parse_filter(&coll.schema, &json!({"plain": "x"})).unwrap();
        let plan = planner.plan(&filter, &[]).unwrap();
        assert_eq!(plan.read_type, ReadType::Primary);
        assert!(plan.residual.is_some());
    }

    #[test]
    fn building_indexes_are_not_planned() {
        let (mut coll, config) = setup();
        let id = coll.meta_by_name("int_value").unwrap().id;
        coll.set_state(id, IndexState::Building);
        let planner = QueryPlanner::new(&coll, &config);
        let filter = parse_filter(&coll.schema, &json!({"int_value": 10})).unwrap();
        let plan = planner.plan(&filter, &[]).unwrap();
        assert_eq!(plan.read_type, ReadType::Primary);
    }

    #[test]
    fn disjunction_of_indexed_fields_unions() {
        let (coll, config) = setup();
        let planner = QueryPlanner::new(&coll, &config);
        let filter = parse_filter(
            &coll.schema,
            &json!({"$or": [{"int_value": 10}, {"double_value": 25.05}]}),
        )
        .unwrap();
        let plan = planner.plan(&filter, &[]).unwrap();
        assert_eq!(plan.read_type, ReadType::SecondaryIndex);
        assert_eq!(plan.scans.len(), 2);
        assert!(plan.residual.is_some());
    }

    #[test]
    fn long_string_equality_keeps_residual() {
        let (coll, config) = setup();
        let planner = QueryPlanner::new(&coll, &config);
        let long = "x".repeat(80);
        let filter =
            parse_filter(&coll.schema, &json!({"string_value": {"$eq": long}})).unwrap();
        let plan = planner.plan(&filter, &[]).unwrap();
        assert_eq!(plan.read_type, ReadType::SecondaryIndex);
        assert!(plan.residual.is_some(), "truncated equality must re-check exactly");

        let short = parse_filter(&coll.schema, &json!({"string_value": "ok"})).unwrap();
        let plan = planner.plan(&short, &[]).unwrap();
        assert!(plan.residual.is_none());
    }
}
