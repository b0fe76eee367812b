//! Canonical data model (spec §3): `Entry`, `Query`, `Range` and the
//! field-extraction configuration threaded through the streaming reader.
//!
//! The filter AST itself (`FilterNode`, `Op`, `LogicalOp`) lives in
//! [`crate::filter`] since it is a component (C1) in its own right; this
//! module re-exports it so `Query` can reference it without a cyclic
//! `mod` dependency.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use crate::filter::{FilterNode, LogicalOp, Op};

/// A single heterogeneous field value extracted from a log line or returned
/// by a structured backend (spec §3: "string, number, bool").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    String(String),
    Number(f64),
    Bool(bool),
}

impl FieldValue {
    /// Render as a string for comparison/evaluation purposes; this is the
    /// representation the local evaluator falls back to when numeric
    /// coercion fails (spec §4.1).
    pub fn as_compare_str(&self) -> String {
        match self {
            FieldValue::String(s) => s.clone(),
            FieldValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    n.to_string()
                }
            }
            FieldValue::Bool(b) => b.to_string(),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::String(s) => s.trim().parse::<f64>().ok(),
            FieldValue::Bool(_) => None,
        }
    }

    /// "Presence and non-empty" per the `exists` operator semantics.
    pub fn is_present_and_non_empty(&self) -> bool {
        match self {
            FieldValue::String(s) => !s.is_empty(),
            FieldValue::Number(_) => true,
            FieldValue::Bool(_) => true,
        }
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_compare_str())
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::String(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::String(s)
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        FieldValue::Number(n)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

/// The canonical unit returned by every backend (spec §3).
///
/// Entries are immutable after emission: adapters and the reader build one,
/// hand it to a channel or a `Vec`, and never mutate it again (the one
/// carve-out is the multi-pod fan-out in §4.6, which wraps — rather than
/// mutates — entries to inject `fields.pod` post-hoc).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// Monotonic wall-clock instant; `None` if the source carried no
    /// detectable timestamp.
    pub timestamp: Option<DateTime<Utc>>,
    pub level: Option<String>,
    /// Raw text, possibly multiline.
    pub message: String,
    /// Origin tag: pod name, container id prefix, host, etc.
    pub context_id: Option<String>,
    pub fields: HashMap<String, FieldValue>,
}

impl Entry {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            timestamp: None,
            level: None,
            message: message.into(),
            context_id: None,
            fields: HashMap::new(),
        }
    }

    /// Field lookup used by the evaluator: checks `fields` directly, then
    /// falls back to a nested `fields.fields` map for backends that wrap
    /// their payload (spec §4.1).
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }
}

/// One of the two range shapes a `Query` may carry (spec §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Range {
    /// `last=D`: a duration measured back from "now" at query-execution
    /// time.
    Relative(chrono::Duration),
    /// Absolute `gte`/`lte` instants; either bound may be absent.
    Absolute {
        gte: Option<DateTime<Utc>>,
        lte: Option<DateTime<Utc>>,
    },
}

impl Default for Range {
    fn default() -> Self {
        Range::Relative(chrono::Duration::minutes(15))
    }
}

/// Field-extraction configuration consumed by the streaming reader (C3,
/// spec §4.3).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldExtraction {
    /// Regex whose match, if found anywhere in a line, both starts a new
    /// logical entry and is parsed as a timestamp. A leading `^` is
    /// stripped before matching so PTY/service-tag prefixes don't defeat
    /// detection (spec §4.3 step 1).
    pub timestamp_regex: Option<String>,
    /// Attempt to parse the residual message as a JSON object and lift its
    /// fields.
    pub json_extract: bool,
    /// Regex with named capture groups; each becomes a field.
    pub named_group_regex: Option<String>,
    /// Regex producing `(key, value)` pairs; each becomes a field.
    pub kv_regex: Option<String>,
}

/// Sentinel key in `Query::options` adapters set after performing
/// server-side filtering so the reader skips client-side re-application
/// (spec §4.3 step 7, §4.5, DESIGN NOTES).
pub const PRE_FILTERED_OPTION: &str = "pre_filtered";

/// Immutable query inputs (spec §3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Query {
    pub range: Option<Range>,
    /// Maximum entries; `None`/`0` means "backend default".
    pub size: Option<usize>,
    pub follow: bool,
    /// Legacy key→value equality map.
    pub fields: HashMap<String, String>,
    /// Legacy key→operator map using backend-native operator names,
    /// treated as an opaque hint per the Open Question in spec §9: prefer
    /// `filter` when both are present, never silently merged.
    pub field_conditions: HashMap<String, String>,
    /// The root of the filter AST; when present this overrides `fields`.
    pub filter: Option<FilterNode>,
    pub field_extraction: FieldExtraction,
    /// Backend-specific option bag: index, container, pod, label-selector,
    /// path, cmd, and the `pre_filtered` marker.
    pub options: HashMap<String, String>,
    /// Opaque token from a prior result enabling resumption.
    pub page_token: Option<String>,
    /// Named placeholders substitutable into `options`.
    pub variables: HashMap<String, String>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// `GetEffectiveFilter`: returns `filter` if set, otherwise synthesises
    /// an AND-of-equals from the legacy `fields` map (spec §3 invariants).
    pub fn effective_filter(&self) -> FilterNode {
        if let Some(filter) = &self.filter {
            return filter.clone();
        }
        let children = self
            .fields
            .iter()
            .map(|(field, value)| FilterNode::Leaf {
                field: field.clone(),
                op: Op::Equals,
                value: value.clone(),
                negate: false,
            })
            .collect();
        FilterNode::Branch {
            logic: LogicalOp::And,
            children,
        }
    }

    /// Whether an adapter (or a remote SSH session confirmed to be running
    /// `hl`) has already applied `filter` server-side, so the reader should
    /// not re-filter (spec §4.3 step 7, §4.5).
    pub fn is_pre_filtered(&self) -> bool {
        self.options
            .get(PRE_FILTERED_OPTION)
            .map(|v| v == "true")
            .unwrap_or(false)
    }

    pub fn mark_pre_filtered(&mut self) {
        self.options
            .insert(PRE_FILTERED_OPTION.to_string(), "true".to_string());
    }

    /// Deep-copy of the mutable maps, used by fan-out paths (label-selector
    /// pod listing, multi-target aggregation) so concurrent workers never
    /// race on a shared `Query` (spec §4.6, DESIGN NOTES).
    pub fn deep_copy(&self) -> Self {
        self.clone()
    }
}

/// A single requested field→discovered-values mapping, the return shape of
/// `GetValues` (spec §1, §6).
pub type FieldValues = HashMap<String, Vec<String>>;
