//! Translator for Splunk's SPL search language (spec §4.4 "Splunk").

use chrono::{DateTime, Utc};

use crate::filter::{FilterNode, LogicalOp, Op, FULL_TEXT_FIELD};
use crate::models::Range;

use super::bounds;

/// Build the SPL search string for a filter. `exists(f)` becomes
/// `| where isnotnull(f)`, which (being a pipe stage) is appended after
/// the boolean search clause rather than inlined into it.
pub fn build_search(filter: &FilterNode) -> String {
    let (clause, where_stages) = render(filter);
    let mut search = clause;
    for stage in where_stages {
        search.push_str(" | ");
        search.push_str(&stage);
    }
    search
}

/// Resolve a query's range into Splunk job-create parameters.
pub fn time_bounds(range: &Range, now: DateTime<Utc>) -> (String, String) {
    let (gte, lte) = bounds(range, now);
    let earliest = gte.map(|dt| dt.to_rfc3339()).unwrap_or_else(|| "0".to_string());
    (earliest, lte.to_rfc3339())
}

fn render(node: &FilterNode) -> (String, Vec<String>) {
    match node {
        FilterNode::Leaf { field, op, value, negate } => render_leaf(field, *op, value, *negate),
        FilterNode::Branch { logic, children } => {
            let mut where_stages = Vec::new();
            let mut parts = Vec::new();
            for child in children {
                let (clause, stages) = render(child);
                where_stages.extend(stages);
                // `exists`/negated-`regex` leaves render to an empty inline
                // clause (their predicate lives entirely in `where_stages`);
                // an empty part must not reach the boolean joiner below or
                // it leaves a dangling "AND "/"OR " in the clause.
                if !clause.is_empty() {
                    parts.push(clause);
                }
            }
            let joiner = match logic {
                LogicalOp::And => " AND ",
                LogicalOp::Or => " OR ",
                LogicalOp::Not => " AND ",
            };
            let body = parts.join(joiner);
            let body = match logic {
                LogicalOp::Not if body.is_empty() => body,
                LogicalOp::Not => format!("NOT ({body})"),
                _ if parts.len() > 1 => format!("({body})"),
                _ => body,
            };
            (body, where_stages)
        }
    }
}

fn render_leaf(field: &str, op: Op, value: &str, negate: bool) -> (String, Vec<String>) {
    let field = if field == FULL_TEXT_FIELD { "_raw" } else { field };
    match op {
        Op::Exists => {
            let predicate = if negate { "isnull" } else { "isnotnull" };
            (String::new(), vec![format!("where {predicate}({field})")])
        }
        Op::Equals => {
            let op_str = if negate { "!=" } else { "=" };
            (format!("{field}{op_str}{}", quote(value)), Vec::new())
        }
        Op::Match => {
            let clause = format!("{field}=*{value}*");
            let clause = if negate { format!("NOT {clause}") } else { clause };
            (clause, Vec::new())
        }
        Op::Wildcard => {
            let clause = format!("{field}={}", quote(value));
            let clause = if negate { format!("NOT {clause}") } else { clause };
            (clause, Vec::new())
        }
        Op::Regex => {
            let stage = format!("regex {field}={}", quote(value));
            let stage = if negate {
                format!("where NOT match({field}, {})", quote(value))
            } else {
                stage
            };
            (String::new(), vec![stage])
        }
        Op::Gt | Op::Gte | Op::Lt | Op::Lte => {
            let op_str = match op {
                Op::Gt => ">",
                Op::Gte => ">=",
                Op::Lt => "<",
                Op::Lte => "<=",
                _ => unreachable!(),
            };
            (format!("{field}{op_str}{value}"), Vec::new())
        }
    }
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\\\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::parse_query_expression;

    #[test]
    fn equality_and_comparison_render_inline() {
        let filter = parse_query_expression("level=error AND status>=500").unwrap();
        assert_eq!(build_search(&filter), r#"level="error" AND status>=500"#);
    }

    #[test]
    fn exists_becomes_where_stage() {
        let filter = FilterNode::leaf("trace_id", Op::Exists, "");
        assert_eq!(build_search(&filter), " | where isnotnull(trace_id)");
    }

    #[test]
    fn full_text_sentinel_maps_to_raw_field() {
        let filter = FilterNode::leaf(FULL_TEXT_FIELD, Op::Match, "refused");
        assert_eq!(build_search(&filter), "_raw=*refused*");
    }

    #[test]
    fn branch_mixing_an_inline_leaf_with_a_staged_leaf_has_no_dangling_joiner() {
        let filter = FilterNode::and(vec![
            FilterNode::leaf("level", Op::Equals, "error"),
            FilterNode::leaf("trace_id", Op::Exists, ""),
        ]);
        assert_eq!(build_search(&filter), r#"level="error" | where isnotnull(trace_id)"#);
    }

    #[test]
    fn branch_of_only_staged_leaves_has_no_dangling_boolean_operator() {
        let filter = FilterNode::or(vec![
            FilterNode::leaf("trace_id", Op::Exists, ""),
            FilterNode::leaf("span_id", Op::Exists, ""),
        ]);
        let search = build_search(&filter);
        assert!(!search.contains("OR"), "no inline clause survives to join: {search:?}");
        assert_eq!(search, " | where isnotnull(trace_id) | where isnotnull(span_id)");
    }
}
