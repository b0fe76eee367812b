//! Backend adapters (C5, spec §4.6): a uniform `query`/`get_field_values`
//! contract, one implementation per backend family.

pub mod cloudwatch;
pub mod docker;
pub mod elasticsearch;
pub mod kubernetes;
pub mod local_cmd;
pub mod splunk;
pub mod ssh;

use std::collections::HashSet;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::errors::EngineResult;
use crate::models::{Entry, FieldValues, Query};

/// Result of a `query` call: an initial batch, and, for `follow` queries,
/// a channel of further batches plus a parallel error channel (mirrors
/// [`crate::reader::ReaderOutput`], which most adapters build on).
#[derive(Debug)]
pub struct QueryResult {
    pub initial: Vec<Entry>,
    pub follow_rx: Option<mpsc::Receiver<Vec<Entry>>>,
    pub error_rx: Option<mpsc::Receiver<String>>,
    pub discovered_fields: HashSet<String>,
    pub next_page_token: Option<String>,
}

impl QueryResult {
    pub fn bounded(initial: Vec<Entry>) -> Self {
        let discovered_fields = discovered_fields_of(&initial);
        Self {
            initial,
            follow_rx: None,
            error_rx: None,
            discovered_fields,
            next_page_token: None,
        }
    }
}

/// Union of field names (plus `level` where present) observed across a
/// batch, for backends — ES, Splunk, CloudWatch — that build `Entry`s
/// directly from a structured response rather than through the line
/// reader, which tracks this incrementally itself.
pub fn discovered_fields_of(entries: &[Entry]) -> HashSet<String> {
    let mut out = HashSet::new();
    for entry in entries {
        if entry.level.is_some() {
            out.insert("level".to_string());
        }
        out.extend(entry.fields.keys().cloned());
    }
    out
}

impl From<crate::reader::ReaderOutput> for QueryResult {
    fn from(output: crate::reader::ReaderOutput) -> Self {
        Self {
            initial: output.initial,
            follow_rx: output.follow_rx,
            error_rx: output.error_rx,
            discovered_fields: output.discovered_fields,
            next_page_token: None,
        }
    }
}

/// The contract every backend implements (spec §4.6).
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    async fn query(&self, query: Query) -> EngineResult<QueryResult>;

    /// Text backends implement this by executing the query and extracting
    /// unique values from entries; structured backends may use native
    /// aggregations instead.
    async fn get_field_values(&self, query: Query, fields: &[String]) -> EngineResult<FieldValues>;
}

/// Default `get_field_values` for text backends: run `query`, then
/// collect each requested field's distinct observed values.
pub async fn field_values_from_entries(
    adapter: &(dyn SourceAdapter + Send + Sync),
    query: Query,
    fields: &[String],
) -> EngineResult<FieldValues> {
    let result = adapter.query(query).await?;
    Ok(values_from_entries(&result.initial, fields))
}

/// Collect each named field's distinct observed values out of an already
/// fetched entry batch. Shared by [`field_values_from_entries`] and the
/// `query field` CLI path, which discovers field names first and then
/// wants their values from the same batch rather than re-querying.
pub fn values_from_entries(entries: &[Entry], fields: &[String]) -> FieldValues {
    let mut out: FieldValues = fields.iter().map(|f| (f.clone(), Vec::new())).collect();
    for entry in entries {
        for field in fields {
            let value = if field == crate::filter::FULL_TEXT_FIELD {
                Some(entry.message.clone())
            } else if field == "level" {
                entry.level.clone()
            } else {
                entry.fields.get(field).map(|v| v.as_compare_str())
            };
            if let Some(value) = value {
                let bucket = out.get_mut(field).unwrap();
                if !bucket.contains(&value) {
                    bucket.push(value);
                }
            }
        }
    }
    out
}
