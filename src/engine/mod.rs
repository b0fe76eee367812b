//! Engine facade (C7, spec §4.8): a lazy, memoized mapping from config
//! name to adapter instance, plus the multi-source query entry points
//! that drive the aggregator across several names at once.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::adapters::cloudwatch::CloudWatchAdapter;
use crate::adapters::docker::DockerAdapter;
use crate::adapters::elasticsearch::ElasticsearchAdapter;
use crate::adapters::kubernetes::KubernetesAdapter;
use crate::adapters::local_cmd::LocalCmdAdapter;
use crate::adapters::splunk::SplunkAdapter;
use crate::adapters::ssh::SshAdapter;
use crate::adapters::{QueryResult, SourceAdapter};
use crate::aggregator::{AggregateResult, Aggregator};
use crate::config::{BackendType, Config};
use crate::errors::{EngineError, EngineResult};
use crate::models::{FieldValues, Query};

/// Holds configuration and memoizes constructed adapters behind a mutex
/// (construction is async — dialing Kubernetes, loading AWS config — so a
/// plain `OnceCell` per entry isn't enough; the mutex only guards the
/// memoization map, not adapter calls themselves).
pub struct Engine {
    config: Config,
    instances: Mutex<HashMap<String, Arc<dyn SourceAdapter>>>,
}

impl Engine {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            instances: Mutex::new(HashMap::new()),
        }
    }

    /// Construct (on first call) or return the memoized adapter for a
    /// named backend. Construction errors surface here, not from the
    /// config lookup itself (spec §4.8).
    pub async fn get(&self, name: &str) -> EngineResult<Arc<dyn SourceAdapter>> {
        {
            let instances = self.instances.lock().await;
            if let Some(adapter) = instances.get(name) {
                return Ok(adapter.clone());
            }
        }

        let backend = self.config.backend(name)?;
        let variables = HashMap::new();
        let adapter: Arc<dyn SourceAdapter> = match backend.backend_type {
            BackendType::Elasticsearch => Arc::new(ElasticsearchAdapter::new(backend, &variables)?),
            BackendType::Splunk => Arc::new(SplunkAdapter::new(backend, &variables)?),
            BackendType::Docker => Arc::new(DockerAdapter::new(backend, &variables)?),
            BackendType::Kubernetes => Arc::new(KubernetesAdapter::new(backend, &variables).await?),
            BackendType::Ssh => Arc::new(SshAdapter::new(backend, &variables)?),
            BackendType::Cloudwatch => Arc::new(CloudWatchAdapter::new(backend, &variables).await?),
            BackendType::LocalCmd | BackendType::Hl => Arc::new(LocalCmdAdapter::new(backend, &variables)?),
        };

        let mut instances = self.instances.lock().await;
        let adapter = instances.entry(name.to_string()).or_insert(adapter).clone();
        Ok(adapter)
    }

    /// Run `query` against a single named backend.
    pub async fn query(&self, name: &str, query: Query) -> EngineResult<QueryResult> {
        let adapter = self.get(name).await?;
        adapter.query(query).await
    }

    /// Run `query` against every named backend concurrently and merge the
    /// results through the aggregator (spec §4.7).
    pub async fn query_many(&self, names: &[String], query: Query) -> EngineResult<AggregateResult> {
        let mut tasks = Vec::with_capacity(names.len());
        for name in names {
            let adapter = self.get(name).await;
            let query = query.deep_copy();
            tasks.push(tokio::spawn(async move {
                match adapter {
                    Ok(adapter) => adapter.query(query).await,
                    Err(e) => Err(e),
                }
            }));
        }

        let mut aggregator = Aggregator::new();
        for task in tasks {
            match task.await {
                Ok(result) => aggregator.add(result),
                Err(join_err) => aggregator.add(Err(EngineError::stream(join_err.to_string()))),
            }
        }
        aggregator.finish()
    }

    pub async fn get_field_values(
        &self,
        name: &str,
        query: Query,
        fields: &[String],
    ) -> EngineResult<FieldValues> {
        let adapter = self.get(name).await?;
        adapter.get_field_values(query, fields).await
    }
}
