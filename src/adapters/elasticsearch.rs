//! Elasticsearch/Kibana adapter: a single `POST /internal/search/es` per
//! query, no native streaming (spec §4.6 "Elasticsearch/Kibana").

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::adapters::{field_values_from_entries, QueryResult, SourceAdapter};
use crate::config::BackendConfig;
use crate::errors::{EngineError, EngineResult};
use crate::models::{Entry, FieldValue, FieldValues, Query};
use crate::translate::elasticsearch::build_request_body;
use crate::util::interpolate::interpolate_map;

pub struct ElasticsearchAdapter {
    client: Client,
    endpoint: String,
    index: String,
}

impl ElasticsearchAdapter {
    pub fn new(config: &BackendConfig, variables: &HashMap<String, String>) -> EngineResult<Self> {
        let options = interpolate_map(&config.options, variables)?;
        let endpoint = options
            .get("endpoint")
            .ok_or_else(|| EngineError::configuration("elasticsearch backend missing 'endpoint'"))?
            .clone();
        let index = options
            .get("index")
            .ok_or_else(|| EngineError::configuration("elasticsearch backend missing 'index'"))?
            .clone();
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("logviewer-engine/1.0")
            .build()
            .map_err(EngineError::from)?;
        Ok(Self { client, endpoint, index })
    }
}

#[async_trait]
impl SourceAdapter for ElasticsearchAdapter {
    async fn query(&self, query: Query) -> EngineResult<QueryResult> {
        let filter = query.effective_filter();
        let range = query.range.clone().unwrap_or_default();
        let body = build_request_body(&filter, &range, query.size, chrono::Utc::now());

        let url = format!("{}/internal/search/es", self.endpoint.trim_end_matches('/'));
        debug!(%url, index = %self.index, "executing elasticsearch query");

        let response = self
            .client
            .post(&url)
            .query(&[("index", self.index.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| EngineError::transport("elasticsearch", e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| EngineError::transport("elasticsearch", e.to_string()))?;

        if !status.is_success() {
            return Err(EngineError::protocol(
                "elasticsearch",
                format!("unexpected status {status}"),
                excerpt(&text),
            ));
        }

        let parsed: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| EngineError::protocol("elasticsearch", e.to_string(), excerpt(&text)))?;

        let hits = parsed
            .pointer("/rawResponse/hits/hits")
            .or_else(|| parsed.pointer("/hits/hits"))
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();

        let entries = hits.iter().filter_map(hit_to_entry).collect();
        Ok(QueryResult::bounded(entries))
    }

    async fn get_field_values(&self, query: Query, fields: &[String]) -> EngineResult<FieldValues> {
        field_values_from_entries(self, query, fields).await
    }
}

fn hit_to_entry(hit: &serde_json::Value) -> Option<Entry> {
    let source = hit.get("_source")?;
    let message = source
        .get("message")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    let mut entry = Entry::new(message);
    entry.timestamp = source
        .get("@timestamp")
        .and_then(|v| v.as_str())
        .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&chrono::Utc));
    if let Some(obj) = source.as_object() {
        for (k, v) in obj {
            if k == "message" || k == "@timestamp" {
                continue;
            }
            let field = match v {
                serde_json::Value::String(s) => Some(FieldValue::String(s.clone())),
                serde_json::Value::Number(n) => n.as_f64().map(FieldValue::Number),
                serde_json::Value::Bool(b) => Some(FieldValue::Bool(*b)),
                _ => None,
            };
            if let Some(field) = field {
                entry.fields.insert(k.clone(), field);
            }
        }
    }
    entry.level = entry
        .fields
        .get("level")
        .or_else(|| entry.fields.get("Level"))
        .map(|v| v.as_compare_str());
    Some(entry)
}

fn excerpt(body: &str) -> String {
    body.chars().take(512).collect()
}
