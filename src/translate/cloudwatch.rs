//! Translator for CloudWatch Logs: both the legacy `FilterPattern`
//! mini-language and Logs Insights query syntax (spec §4.4 "CloudWatch").

use chrono::{DateTime, Utc};

use crate::filter::{FilterNode, LogicalOp, Op, FULL_TEXT_FIELD};
use crate::models::Range;

use super::bounds;

/// Build a CloudWatch Logs `FilterPattern` string. Term matches are
/// unquoted barewords; field comparisons use the `{ $.field = "value" }`
/// metric-filter syntax since plain FilterPattern has no generic
/// field-comparison form.
pub fn build_filter_pattern(node: &FilterNode) -> String {
    match node {
        FilterNode::Leaf { field, op, value, negate } => render_leaf(field, *op, value, *negate),
        FilterNode::Branch { logic, children } => {
            let parts: Vec<String> = children.iter().map(build_filter_pattern).collect();
            match logic {
                LogicalOp::And => format!("{{ {} }}", parts.join(" && ")),
                LogicalOp::Or => format!("{{ {} }}", parts.join(" || ")),
                LogicalOp::Not => format!("{{ !({}) }}", parts.join(" && ")),
            }
        }
    }
}

fn render_leaf(field: &str, op: Op, value: &str, negate: bool) -> String {
    if field == FULL_TEXT_FIELD && matches!(op, Op::Match) {
        return if negate { format!("-\"{value}\"") } else { format!("\"{value}\"") };
    }
    let path = format!("$.{field}");
    let op_str = match (op, negate) {
        (Op::Equals, false) => "=",
        (Op::Equals, true) => "!=",
        (Op::Gt, false) => ">",
        (Op::Gte, false) => ">=",
        (Op::Lt, false) => "<",
        (Op::Lte, false) => "<=",
        _ => "=",
    };
    format!("{path} {op_str} \"{value}\"")
}

/// Build a CloudWatch Logs Insights query string: a `fields` projection
/// followed by one `filter` stage per leaf, joined with the filter's
/// boolean structure re-expressed in Insights' own `and`/`or`/`not`.
pub fn build_insights_query(node: &FilterNode) -> String {
    format!("fields @timestamp, @message | filter {}", render_insights(node))
}

fn render_insights(node: &FilterNode) -> String {
    match node {
        FilterNode::Leaf { field, op, value, negate } => {
            let field = if field == FULL_TEXT_FIELD { "@message" } else { field };
            let op_str = match (op, negate) {
                (Op::Equals, false) => "=",
                (Op::Equals, true) => "!=",
                (Op::Match, false) => "like",
                (Op::Match, true) => "not like",
                (Op::Gt, _) => ">",
                (Op::Gte, _) => ">=",
                (Op::Lt, _) => "<",
                (Op::Lte, _) => "<=",
                _ => "=",
            };
            format!("{field} {op_str} \"{value}\"")
        }
        FilterNode::Branch { logic, children } => {
            let parts: Vec<String> = children.iter().map(render_insights).collect();
            match logic {
                LogicalOp::And => parts.join(" and "),
                LogicalOp::Or => format!("({})", parts.join(" or ")),
                LogicalOp::Not => format!("not ({})", parts.join(" and ")),
            }
        }
    }
}

/// Resolve a query's range into millisecond epoch bounds, the unit both
/// `StartQuery` and `FilterLogEvents` expect.
pub fn time_bounds_millis(range: &Range, now: DateTime<Utc>) -> (i64, i64) {
    let (gte, lte) = bounds(range, now);
    let start = gte.map(|dt| dt.timestamp_millis()).unwrap_or(0);
    (start, lte.timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::parse_query_expression;

    #[test]
    fn insights_query_translates_boolean_structure() {
        let filter = parse_query_expression("level=error AND status>=500").unwrap();
        assert_eq!(
            build_insights_query(&filter),
            "fields @timestamp, @message | filter level = \"error\" and status >= \"500\""
        );
    }

    #[test]
    fn filter_pattern_full_text_is_bareword() {
        let filter = FilterNode::leaf(FULL_TEXT_FIELD, Op::Match, "refused");
        assert_eq!(build_filter_pattern(&filter), "\"refused\"");
    }
}
