//! CloudWatch Logs adapter: `FilterLogEvents` against a log group, using
//! the translated `FilterPattern` (spec §4.4, §4.6 "CloudWatch").

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_cloudwatchlogs::Client;
use tracing::debug;

use crate::adapters::{field_values_from_entries, QueryResult, SourceAdapter};
use crate::config::BackendConfig;
use crate::errors::{EngineError, EngineResult};
use crate::models::{Entry, FieldValues, Query};
use crate::translate::cloudwatch::{build_filter_pattern, time_bounds_millis};
use crate::util::interpolate::interpolate_map;

pub struct CloudWatchAdapter {
    client: Client,
    log_group: String,
}

impl CloudWatchAdapter {
    pub async fn new(config: &BackendConfig, variables: &HashMap<String, String>) -> EngineResult<Self> {
        let options = interpolate_map(&config.options, variables)?;
        let log_group = options
            .get("logGroup")
            .or_else(|| options.get("index"))
            .ok_or_else(|| EngineError::configuration("cloudwatch backend missing 'logGroup'"))?
            .clone();
        let shared_config = aws_config::load_from_env().await;
        let client = Client::new(&shared_config);
        Ok(Self { client, log_group })
    }
}

#[async_trait]
impl SourceAdapter for CloudWatchAdapter {
    async fn query(&self, query: Query) -> EngineResult<QueryResult> {
        let filter = query.effective_filter();
        let pattern = build_filter_pattern(&filter);
        let range = query.range.clone().unwrap_or_default();
        let (start_ms, end_ms) = time_bounds_millis(&range, chrono::Utc::now());

        debug!(log_group = %self.log_group, pattern = %pattern, "executing cloudwatch filter_log_events");

        let mut request = self
            .client
            .filter_log_events()
            .log_group_name(&self.log_group)
            .filter_pattern(pattern)
            .start_time(start_ms)
            .end_time(end_ms);
        if let Some(size) = query.size {
            request = request.limit(size as i32);
        }
        if let Some(token) = &query.page_token {
            request = request.next_token(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| EngineError::transport("cloudwatch", e.to_string()))?;

        let entries = response
            .events()
            .iter()
            .map(|event| {
                let mut entry = Entry::new(event.message().unwrap_or_default());
                entry.timestamp = event
                    .timestamp()
                    .and_then(|ms| chrono::DateTime::from_timestamp_millis(ms));
                entry
            })
            .collect();

        let mut result = QueryResult::bounded(entries);
        result.next_page_token = response.next_token().map(|s| s.to_string());
        Ok(result)
    }

    async fn get_field_values(&self, query: Query, fields: &[String]) -> EngineResult<FieldValues> {
        field_values_from_entries(self, query, fields).await
    }
}
