//! Translator for Elasticsearch/Kibana's query-DSL (spec §4.4
//! "Elasticsearch/Kibana").

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use crate::filter::{FilterNode, LogicalOp, Op, FULL_TEXT_FIELD};
use crate::models::Range;

use super::bounds;

/// Build the full request body for `POST /internal/search/es`: the
/// translated filter plus a timestamp range clause, sorted descending by
/// `@timestamp`, capped at `size`.
pub fn build_request_body(
    filter: &FilterNode,
    range: &Range,
    size: Option<usize>,
    now: DateTime<Utc>,
) -> Value {
    let (gte, lte) = bounds(range, now);
    let mut must = vec![build_query(filter)];

    let mut range_clause = serde_json::Map::new();
    if let Some(gte) = gte {
        range_clause.insert("gte".to_string(), json!(gte.to_rfc3339()));
    }
    range_clause.insert("lte".to_string(), json!(lte.to_rfc3339()));
    must.push(json!({ "range": { "@timestamp": range_clause } }));

    json!({
        "query": { "bool": { "must": must } },
        "sort": [{ "@timestamp": { "order": "desc" } }],
        "size": size.unwrap_or(500),
    })
}

/// Recursively translate a `FilterNode` into an ES query-DSL clause (spec
/// §4.4: leaf → term/match_phrase/regexp/wildcard/range/exists; AND →
/// `bool.must`; OR → `bool.should` with `minimum_should_match: 1`; NOT →
/// `bool.must_not`; a leaf's own `negate` wraps it in `bool.must_not`).
pub fn build_query(node: &FilterNode) -> Value {
    match node {
        FilterNode::Leaf { field, op, value, negate } => {
            let clause = build_leaf(field, *op, value);
            if *negate {
                json!({ "bool": { "must_not": [clause] } })
            } else {
                clause
            }
        }
        FilterNode::Branch { logic, children } => {
            let clauses: Vec<Value> = children.iter().map(build_query).collect();
            match logic {
                LogicalOp::And => json!({ "bool": { "must": clauses } }),
                LogicalOp::Or => json!({
                    "bool": { "should": clauses, "minimum_should_match": 1 }
                }),
                LogicalOp::Not => json!({ "bool": { "must_not": clauses } }),
            }
        }
    }
}

fn es_field(field: &str) -> &str {
    if field == FULL_TEXT_FIELD {
        "_all"
    } else {
        field
    }
}

fn build_leaf(field: &str, op: Op, value: &str) -> Value {
    let field = es_field(field);
    match op {
        Op::Equals => json!({ "term": { field: value } }),
        Op::Match => json!({ "match_phrase": { field: value } }),
        Op::Wildcard => json!({ "wildcard": { field: { "value": value } } }),
        Op::Regex => json!({ "regexp": { field: { "value": value } } }),
        Op::Exists => json!({ "exists": { "field": field } }),
        Op::Gt => json!({ "range": { field: { "gt": numeric_or_string(value) } } }),
        Op::Gte => json!({ "range": { field: { "gte": numeric_or_string(value) } } }),
        Op::Lt => json!({ "range": { field: { "lt": numeric_or_string(value) } } }),
        Op::Lte => json!({ "range": { field: { "lte": numeric_or_string(value) } } }),
    }
}

fn numeric_or_string(value: &str) -> Value {
    value.parse::<f64>().map(|n| json!(n)).unwrap_or_else(|_| json!(value))
}
