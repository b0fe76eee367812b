//! Pretty-printer for `FilterNode`, used to satisfy the round-trip
//! testable property in spec §8: parsing then pretty-printing a filter
//! produces a string that re-parses to the same AST (modulo whitespace and
//! redundant parentheses).

use super::{FilterNode, LogicalOp, Op};

/// Render a filter back into `-q` query-expression syntax.
pub fn pretty_print(node: &FilterNode) -> String {
    render(node, false)
}

fn render(node: &FilterNode, parenthesize_branch: bool) -> String {
    match node {
        FilterNode::Leaf {
            field,
            op,
            value,
            negate,
        } => render_leaf(field, *op, value, *negate),
        FilterNode::Branch { logic, children } => {
            let body = render_branch(*logic, children);
            if parenthesize_branch {
                format!("({body})")
            } else {
                body
            }
        }
    }
}

fn render_leaf(field: &str, op: Op, value: &str, negate: bool) -> String {
    if matches!(op, Op::Exists) {
        let prefix = if negate { "NOT exists" } else { "exists" };
        return format!("{prefix}({field})");
    }
    let op_str = match (op, negate) {
        (Op::Equals, false) => "=",
        (Op::Equals, true) => "!=",
        (Op::Match, false) => "CONTAINS",
        (Op::Match, true) => "!~=",
        (Op::Wildcard, _) => "LIKE",
        (Op::Regex, _) => "~~=",
        (Op::Gt, false) => ">",
        (Op::Gte, false) => ">=",
        (Op::Lt, false) => "<",
        (Op::Lte, false) => "<=",
        _ => "=",
    };
    let needs_not_prefix = matches!(op, Op::Wildcard | Op::Regex) && negate;
    let quoted = quote_if_needed(value);
    if needs_not_prefix {
        format!("NOT {field} {op_str} {quoted}")
    } else {
        format!("{field} {op_str} {quoted}")
    }
}

fn render_branch(logic: LogicalOp, children: &[FilterNode]) -> String {
    match logic {
        LogicalOp::And | LogicalOp::Or => {
            let joiner = if matches!(logic, LogicalOp::And) {
                "AND"
            } else {
                "OR"
            };
            children
                .iter()
                .map(|c| render(c, matches!(c, FilterNode::Branch { .. })))
                .collect::<Vec<_>>()
                .join(&format!(" {joiner} "))
        }
        LogicalOp::Not => {
            let inner = FilterNode::Branch {
                logic: LogicalOp::And,
                children: children.to_vec(),
            };
            format!("NOT ({})", render(&inner, false))
        }
    }
}

const RESERVED_WORDS: &[&str] = &["AND", "OR", "NOT", "EXISTS", "CONTAINS", "LIKE"];
const OPERATOR_SUBSTRINGS: &[&str] = &["=", "<", ">", "~", "!"];

fn quote_if_needed(value: &str) -> String {
    let needs_quoting = value.is_empty()
        || value.chars().any(|c| c.is_whitespace() || "()\"'".contains(c))
        || OPERATOR_SUBSTRINGS.iter().any(|op| value.contains(op))
        || RESERVED_WORDS
            .iter()
            .any(|w| value.eq_ignore_ascii_case(w));
    if needs_quoting {
        format!("\"{}\"", value.replace('"', "\\\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::parser::parse_query_expression;

    fn round_trip(src: &str) {
        let first = parse_query_expression(src).unwrap();
        let printed = pretty_print(&first);
        let second = parse_query_expression(&printed).unwrap();
        assert_eq!(first, second, "round trip mismatch for {src:?} -> {printed:?}");
    }

    #[test]
    fn round_trips_simple_leaf() {
        round_trip("level=error");
    }

    #[test]
    fn round_trips_nested_boolean() {
        round_trip(r#"(level=error OR status>=500) AND service="my api""#);
    }

    #[test]
    fn round_trips_negated_exists() {
        round_trip("NOT exists(trace_id)");
    }

    #[test]
    fn round_trips_wildcard() {
        round_trip(r#"service LIKE "api-*""#);
    }
}
