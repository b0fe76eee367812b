//! Translator for the external `hl` text-filter binary (spec §4.4 "hl"),
//! shared by the local-cmd and SSH adapters.

use crate::filter::{FilterNode, LogicalOp, Op};
use crate::models::Query;
use crate::util::time::render_hl_relative;

/// Build the argv for invoking `hl` against `paths` (or no paths, to read
/// stdin). Always includes `-P --raw`; `-F` for follow; `--since`/`--until`
/// for the resolved time window; `-q <filter>` when the query carries a
/// non-trivial filter.
pub fn build_argv(query: &Query, paths: &[String]) -> Vec<String> {
    let mut argv = vec!["-P".to_string(), "--raw".to_string()];
    if query.follow {
        argv.push("-F".to_string());
    }

    if let Some(range) = &query.range {
        match range {
            crate::models::Range::Relative(duration) => {
                argv.push("--since".to_string());
                argv.push(render_hl_relative(duration));
            }
            crate::models::Range::Absolute { gte, lte } => {
                if let Some(gte) = gte {
                    argv.push("--since".to_string());
                    argv.push(gte.to_rfc3339());
                }
                if let Some(lte) = lte {
                    argv.push("--until".to_string());
                    argv.push(lte.to_rfc3339());
                }
            }
        }
    }

    let filter = query.effective_filter();
    if !is_match_all(&filter) {
        argv.push("-q".to_string());
        argv.push(render_filter(&filter));
    }

    argv.extend(paths.iter().cloned());
    argv
}

fn is_match_all(node: &FilterNode) -> bool {
    matches!(node, FilterNode::Branch { logic: LogicalOp::And, children } if children.is_empty())
}

/// Render a `FilterNode` into hl's own query syntax: `field op value`,
/// parens for grouping, `and`/`or`/`not`, `exists(.field)`, `~~=`/`!~~=`
/// for regex, `~=`/`!~=` for contains, `like`/`not like` for wildcard.
pub fn render_filter(node: &FilterNode) -> String {
    render(node, false)
}

fn render(node: &FilterNode, parenthesize_branch: bool) -> String {
    match node {
        FilterNode::Leaf { field, op, value, negate } => render_leaf(field, *op, value, *negate),
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
        let prefix = if negate { "not exists" } else { "exists" };
        return format!("{prefix}(.{field})");
    }
    let op_str = match (op, negate) {
        (Op::Equals, false) => "=",
        (Op::Equals, true) => "!=",
        (Op::Match, false) => "~=",
        (Op::Match, true) => "!~=",
        (Op::Regex, false) => "~~=",
        (Op::Regex, true) => "!~~=",
        (Op::Wildcard, false) => "like",
        (Op::Wildcard, true) => "not like",
        (Op::Gt, _) => ">",
        (Op::Gte, _) => ">=",
        (Op::Lt, _) => "<",
        (Op::Lte, _) => "<=",
        _ => "=",
    };
    format!("{field} {op_str} {}", hl_quote(value))
}

fn render_branch(logic: LogicalOp, children: &[FilterNode]) -> String {
    match logic {
        LogicalOp::And | LogicalOp::Or => {
            let joiner = if matches!(logic, LogicalOp::And) { "and" } else { "or" };
            children
                .iter()
                .map(|c| render(c, matches!(c, FilterNode::Branch { .. })))
                .collect::<Vec<_>>()
                .join(&format!(" {joiner} "))
        }
        LogicalOp::Not => {
            let inner = FilterNode::Branch { logic: LogicalOp::And, children: children.to_vec() };
            format!("not ({})", render(&inner, false))
        }
    }
}

/// Values containing space/quote/`&|<>=!~()` are wrapped in double quotes
/// with backslash escaping (spec §4.4 "hl").
fn hl_quote(value: &str) -> String {
    let needs_quoting = value.is_empty()
        || value
            .chars()
            .any(|c| c.is_whitespace() || "\"&|<>=!~()".contains(c));
    if !needs_quoting {
        return value.to_string();
    }
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::parse_query_expression;

    #[test]
    fn builds_argv_for_follow_with_relative_range_and_filter() {
        // spec §8 scenario 2
        let mut query = Query::new();
        query.follow = true;
        query.range = Some(crate::models::Range::Relative(chrono::Duration::minutes(15)));
        query.filter = Some(parse_query_expression("level=error AND service=api").unwrap());

        let argv = build_argv(&query, &["/var/log/app.log".to_string()]);
        assert_eq!(
            argv,
            vec![
                "-P",
                "--raw",
                "-F",
                "--since",
                "-15m",
                "-q",
                "level = error and service = api",
                "/var/log/app.log",
            ]
        );
    }

    #[test]
    fn quotes_values_with_hl_metacharacters() {
        assert_eq!(hl_quote("my api"), "\"my api\"");
        assert_eq!(hl_quote("plain"), "plain");
        assert_eq!(hl_quote("a\"b"), "\"a\\\"b\"");
    }

    #[test]
    fn exists_and_negation_render() {
        let f = FilterNode::leaf("trace_id", Op::Exists, "").negated();
        assert_eq!(render_filter(&f), "not exists(.trace_id)");
    }
}
