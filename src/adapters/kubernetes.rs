//! Kubernetes adapter: pod-name or label-selector fan-out, tagging every
//! fanned-out entry with `fields.pod` (spec §4.6 "Kubernetes").

use std::collections::HashMap;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, ListParams};
use kube::Client;
use tokio_util::compat::FuturesAsyncReadCompatExt;
use tracing::debug;

use crate::adapters::{discovered_fields_of, field_values_from_entries, QueryResult, SourceAdapter};
use crate::aggregator::Aggregator;
use crate::config::BackendConfig;
use crate::errors::{EngineError, EngineResult};
use crate::models::{Entry, FieldValues, Query};
use crate::reader::read_bounded;
use crate::translate::kubernetes::build_log_params;
use crate::util::cancel::CancelToken;
use crate::util::interpolate::interpolate_map;

pub struct KubernetesAdapter {
    client: Client,
    namespace: String,
}

impl KubernetesAdapter {
    pub async fn new(config: &BackendConfig, variables: &HashMap<String, String>) -> EngineResult<Self> {
        let options = interpolate_map(&config.options, variables)?;
        let namespace = options.get("namespace").cloned().unwrap_or_else(|| "default".to_string());
        let client = Client::try_default()
            .await
            .map_err(|e| EngineError::transport("kubernetes", e.to_string()))?;
        Ok(Self { client, namespace })
    }

    async fn resolve_pod_names(&self, query: &Query) -> EngineResult<Vec<String>> {
        let options = interpolate_map(&query.options, &query.variables)?;
        if let Some(pod) = options.get("pod") {
            return Ok(vec![pod.clone()]);
        }
        let selector = options
            .get("labelSelector")
            .ok_or_else(|| EngineError::configuration("kubernetes query requires 'pod' or 'labelSelector'"))?;

        let pods: Api<Pod> = Api::namespaced(self.client.clone(), &self.namespace);
        let list = pods
            .list(&ListParams::default().labels(selector))
            .await
            .map_err(|e| EngineError::transport("kubernetes", e.to_string()))?;
        let names: Vec<String> = list.items.into_iter().filter_map(|p| p.metadata.name).collect();
        if names.is_empty() {
            return Err(EngineError::transport("kubernetes", format!("no pods match selector '{selector}'")));
        }
        Ok(names)
    }

    async fn query_one_pod(&self, query: &Query, pod_name: &str) -> EngineResult<QueryResult> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), &self.namespace);
        let params = build_log_params(query, chrono::Utc::now())?;
        debug!(pod_name, "streaming kubernetes pod logs");

        if query.follow {
            let stream = pods
                .log_stream(pod_name, &params)
                .await
                .map_err(|e| EngineError::transport("kubernetes", e.to_string()))?;
            let async_read = stream.compat();
            let cancel = CancelToken::new();
            let pod_name_owned = pod_name.to_string();
            let (mut batch_rx, err_rx) = crate::reader::read_follow(
                async_read,
                query.field_extraction.clone(),
                query.effective_filter(),
                query.is_pre_filtered(),
                cancel,
                || async { None },
            );
            let (tagged_tx, tagged_rx) = tokio::sync::mpsc::channel(64);
            tokio::spawn(async move {
                while let Some(batch) = batch_rx.recv().await {
                    let tagged = tag_pod(batch, &pod_name_owned);
                    if tagged_tx.send(tagged).await.is_err() {
                        break;
                    }
                }
            });
            return Ok(QueryResult {
                initial: Vec::new(),
                follow_rx: Some(tagged_rx),
                error_rx: Some(err_rx),
                discovered_fields: Default::default(),
                next_page_token: None,
            });
        }

        let logs = pods
            .logs(pod_name, &params)
            .await
            .map_err(|e| EngineError::transport("kubernetes", e.to_string()))?;
        let output = read_bounded(
            logs.as_bytes(),
            query.field_extraction.clone(),
            query.effective_filter(),
            query.is_pre_filtered(),
            query.size,
        )
        .await
        .map_err(|e| EngineError::stream(e.to_string()))?;
        let mut result: QueryResult = output.into();
        result.initial = tag_pod(result.initial, pod_name);
        Ok(result)
    }
}

fn tag_pod(mut entries: Vec<Entry>, pod_name: &str) -> Vec<Entry> {
    for entry in &mut entries {
        entry.fields.insert("pod".to_string(), pod_name.into());
    }
    entries
}

#[async_trait]
impl SourceAdapter for KubernetesAdapter {
    async fn query(&self, query: Query) -> EngineResult<QueryResult> {
        let pod_names = self.resolve_pod_names(&query).await?;

        if pod_names.len() == 1 {
            return self.query_one_pod(&query, &pod_names[0]).await;
        }

        // Label-selector fan-out: deep-copy the query per pod so
        // concurrent workers never race on shared maps (spec §4.6), then
        // merge the per-pod results — including their follow streams —
        // through the same aggregator the engine uses across backends, so
        // a multi-pod follow query keeps streaming instead of collapsing
        // to an empty bounded result.
        let mut aggregator = Aggregator::new();
        for pod_name in &pod_names {
            let per_pod_query = query.deep_copy();
            aggregator.add(self.query_one_pod(&per_pod_query, pod_name).await);
        }
        let merged = aggregator.finish()?;
        Ok(QueryResult {
            discovered_fields: discovered_fields_of(&merged.initial),
            initial: merged.initial,
            follow_rx: merged.follow_rx,
            error_rx: merged.error_rx,
            next_page_token: None,
        })
    }

    async fn get_field_values(&self, query: Query, fields: &[String]) -> EngineResult<FieldValues> {
        field_values_from_entries(self, query, fields).await
    }
}
