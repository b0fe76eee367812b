//! Filter AST and local evaluator (C1, spec §4.1).
//!
//! A `FilterNode` is either a pure leaf (non-empty `field`) or a pure
//! branch (non-empty `logic`); the two shapes are kept in separate enum
//! variants precisely so the "mixed forms are malformed" invariant in
//! spec §3 can't even be represented, let alone fallen into.

pub mod lexer;
pub mod parser;
pub mod pretty;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::{Entry, FieldValue};

pub use parser::{combine_filter_flags, parse_filter_flag, parse_query_expression, ParseError};
pub use pretty::pretty_print;

/// The closed set of leaf operators (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Op {
    Equals,
    /// Case-insensitive substring.
    Match,
    /// Glob with `*`.
    Wildcard,
    /// Go-style regex.
    Regex,
    /// Field presence & non-empty.
    Exists,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl std::fmt::Display for Op {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Op::Equals => "=",
            Op::Match => "~=",
            Op::Wildcard => "like",
            Op::Regex => "~~=",
            Op::Exists => "exists",
            Op::Gt => ">",
            Op::Gte => ">=",
            Op::Lt => "<",
            Op::Lte => "<=",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalOp {
    And,
    Or,
    Not,
}

/// The sentinel field denoting full-text / message search (spec §3).
pub const FULL_TEXT_FIELD: &str = "_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterNode {
    Leaf {
        field: String,
        op: Op,
        value: String,
        negate: bool,
    },
    Branch {
        logic: LogicalOp,
        children: Vec<FilterNode>,
    },
}

impl FilterNode {
    pub fn leaf(field: impl Into<String>, op: Op, value: impl Into<String>) -> Self {
        FilterNode::Leaf {
            field: field.into(),
            op,
            value: value.into(),
            negate: false,
        }
    }

    pub fn negated(mut self) -> Self {
        match &mut self {
            FilterNode::Leaf { negate, .. } => *negate = !*negate,
            FilterNode::Branch { logic, children } => {
                return FilterNode::Branch {
                    logic: LogicalOp::Not,
                    children: vec![FilterNode::Branch {
                        logic: *logic,
                        children: std::mem::take(children),
                    }],
                };
            }
        }
        self
    }

    pub fn and(children: Vec<FilterNode>) -> Self {
        FilterNode::Branch {
            logic: LogicalOp::And,
            children,
        }
    }

    pub fn or(children: Vec<FilterNode>) -> Self {
        FilterNode::Branch {
            logic: LogicalOp::Or,
            children,
        }
    }

    /// Evaluate this filter against an entry (spec §4.1).
    pub fn matches(&self, entry: &Entry) -> bool {
        match self {
            FilterNode::Leaf {
                field,
                op,
                value,
                negate,
            } => {
                let raw = eval_leaf(field, *op, value, entry);
                raw ^ negate
            }
            FilterNode::Branch { logic, children } => match logic {
                LogicalOp::And => children.iter().all(|c| c.matches(entry)),
                LogicalOp::Or => {
                    if children.is_empty() {
                        // Empty-fold identity (spec §3 invariants).
                        false
                    } else {
                        children.iter().any(|c| c.matches(entry))
                    }
                }
                LogicalOp::Not => {
                    // NOT with multiple children is NOT(AND of children).
                    !children.iter().all(|c| c.matches(entry))
                }
            },
        }
    }
}

fn field_value<'a>(entry: &'a Entry, field: &str) -> Option<&'a FieldValue> {
    if field == FULL_TEXT_FIELD {
        return None;
    }
    entry.field(field)
}

fn message_or_field(entry: &Entry, field: &str) -> Option<String> {
    if field == FULL_TEXT_FIELD {
        return Some(entry.message.clone());
    }
    field_value(entry, field).map(|v| v.as_compare_str())
}

fn eval_leaf(field: &str, op: Op, value: &str, entry: &Entry) -> bool {
    match op {
        Op::Exists => {
            if field == FULL_TEXT_FIELD {
                return !entry.message.is_empty();
            }
            field_value(entry, field)
                .map(|v| v.is_present_and_non_empty())
                .unwrap_or(false)
        }
        Op::Equals => match message_or_field(entry, field) {
            Some(actual) => actual == value,
            None => false,
        },
        Op::Match => match message_or_field(entry, field) {
            Some(actual) => actual.to_lowercase().contains(&value.to_lowercase()),
            None => false,
        },
        Op::Wildcard => match message_or_field(entry, field) {
            Some(actual) => wildcard_match(&actual, value),
            None => false,
        },
        Op::Regex => match message_or_field(entry, field) {
            Some(actual) => regex::Regex::new(value)
                .map(|re| re.is_match(&actual))
                .unwrap_or(false),
            None => false,
        },
        Op::Gt | Op::Gte | Op::Lt | Op::Lte => {
            let actual = if field == FULL_TEXT_FIELD {
                Some(FieldValue::String(entry.message.clone()))
            } else {
                field_value(entry, field).cloned()
            };
            match actual {
                Some(actual) => compare_ordered(&actual, value, op),
                None => false,
            }
        }
    }
}

/// Numeric comparison with string fallback (spec §4.1).
fn compare_ordered(actual: &FieldValue, rhs: &str, op: Op) -> bool {
    let ordering = match (actual.as_f64(), rhs.trim().parse::<f64>().ok()) {
        (Some(a), Some(b)) => a.partial_cmp(&b),
        _ => actual.as_compare_str().as_str().partial_cmp(rhs),
    };
    let Some(ordering) = ordering else {
        return false;
    };
    match op {
        Op::Gt => ordering == std::cmp::Ordering::Greater,
        Op::Gte => ordering != std::cmp::Ordering::Less,
        Op::Lt => ordering == std::cmp::Ordering::Less,
        Op::Lte => ordering != std::cmp::Ordering::Greater,
        _ => unreachable!(),
    }
}

/// `*` matches any substring run, anchored to the full field (spec §4.1).
pub fn wildcard_match(haystack: &str, pattern: &str) -> bool {
    let regex_src = wildcard_to_regex(pattern);
    regex::Regex::new(&regex_src)
        .map(|re| re.is_match(haystack))
        .unwrap_or(false)
}

/// Compile a `*`-glob into an anchored, case-insensitive regex string.
pub fn wildcard_to_regex(pattern: &str) -> String {
    let mut out = String::from("(?i)^");
    for part in pattern.split('*') {
        out.push_str(&regex::escape(part));
        out.push_str(".*");
    }
    // Trim the trailing ".*" we appended once too many, then re-anchor.
    out.truncate(out.len() - 2);
    out.push('$');
    out
}

/// Convenience for synthesising a legacy `field_conditions` map into a
/// filter tree, treated as an opaque AND-of-operators hint (spec §9 Open
/// Question). Unlike `fields`, the operator names here are backend-native
/// and only meaningful to whichever adapter produced them; the local
/// evaluator here maps the handful of common names it understands.
pub fn from_legacy_field_conditions(conditions: &HashMap<String, String>) -> Option<FilterNode> {
    if conditions.is_empty() {
        return None;
    }
    let children = conditions
        .iter()
        .map(|(field, op_value)| {
            // "op:value" convention, e.g. "gt:500".
            if let Some((op_name, value)) = op_value.split_once(':') {
                let op = match op_name {
                    "gt" => Op::Gt,
                    "gte" => Op::Gte,
                    "lt" => Op::Lt,
                    "lte" => Op::Lte,
                    "match" | "match_phrase" => Op::Match,
                    "wildcard" => Op::Wildcard,
                    "regexp" | "regex" => Op::Regex,
                    _ => Op::Equals,
                };
                FilterNode::leaf(field.clone(), op, value)
            } else {
                FilterNode::leaf(field.clone(), Op::Equals, op_value.clone())
            }
        })
        .collect();
    Some(FilterNode::and(children))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn entry_with(fields: &[(&str, FieldValue)]) -> Entry {
        let mut e = Entry::new("hello world");
        for (k, v) in fields {
            e.fields.insert(k.to_string(), v.clone());
        }
        e
    }

    #[test]
    fn empty_filter_matches_all() {
        let f = FilterNode::and(vec![]);
        assert!(f.matches(&Entry::new("anything")));
    }

    #[test]
    fn empty_or_is_false() {
        let f = FilterNode::or(vec![]);
        assert!(!f.matches(&Entry::new("anything")));
    }

    #[test]
    fn missing_field_numeric_comparison_is_false() {
        let f = FilterNode::leaf("status", Op::Gte, "500");
        assert!(!f.matches(&Entry::new("no fields here")));
    }

    #[test]
    fn missing_field_exists_is_false_negated_is_true() {
        let exists = FilterNode::leaf("status", Op::Exists, "");
        assert!(!exists.matches(&Entry::new("x")));
        assert!(exists.negated().matches(&Entry::new("x")));
    }

    #[test]
    fn wildcard_is_anchored() {
        assert!(wildcard_match("service-api-prod", "service-*-prod"));
        assert!(!wildcard_match("other-service-api-prod", "service-*-prod"));
    }

    #[test]
    fn negate_flips_after_raw_predicate() {
        let e = entry_with(&[("level", FieldValue::from("info"))]);
        let f = FilterNode::leaf("level", Op::Equals, "error").negated();
        assert!(f.matches(&e));
    }

    #[test]
    fn not_branch_inverts_and_fold() {
        let e = entry_with(&[("a", FieldValue::from("1")), ("b", FieldValue::from("2"))]);
        let not_both = FilterNode::Branch {
            logic: LogicalOp::Not,
            children: vec![
                FilterNode::leaf("a", Op::Equals, "1"),
                FilterNode::leaf("b", Op::Equals, "999"),
            ],
        };
        assert!(not_both.matches(&e));
    }

    #[test]
    fn numeric_fallback_to_lexicographic() {
        let e = entry_with(&[("tag", FieldValue::from("banana"))]);
        let f = FilterNode::leaf("tag", Op::Gt, "apple");
        assert!(f.matches(&e));
    }

    #[test]
    fn full_text_sentinel_searches_message() {
        let e = Entry::new("connection refused by peer");
        let f = FilterNode::leaf(FULL_TEXT_FIELD, Op::Match, "refused");
        assert!(f.matches(&e));
    }

    #[test]
    fn legacy_field_conditions_opaque_operator() {
        let mut conditions = HashMap::new();
        conditions.insert("status".to_string(), "gte:500".to_string());
        let filter = from_legacy_field_conditions(&conditions).unwrap();
        let e = entry_with(&[("status", FieldValue::from(502.0))]);
        assert!(filter.matches(&e));
    }
}
