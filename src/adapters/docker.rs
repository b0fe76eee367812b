//! Docker adapter: container-id or compose-service discovery, with
//! stdout/stderr demultiplexing (spec §4.6 "Docker").

use std::collections::HashMap;

use async_trait::async_trait;
use bollard::container::ListContainersOptions;
use bollard::Docker;
use futures::{Stream, StreamExt};
use tracing::debug;

use crate::adapters::{field_values_from_entries, QueryResult, SourceAdapter};
use crate::config::BackendConfig;
use crate::errors::{EngineError, EngineResult};
use crate::models::{FieldValues, Query};
use crate::reader::read_bounded;
use crate::translate::docker::build_logs_options;
use crate::util::cancel::CancelToken;
use crate::util::interpolate::interpolate_map;

pub struct DockerAdapter {
    docker: Docker,
    project: Option<String>,
}

impl DockerAdapter {
    pub fn new(config: &BackendConfig, variables: &HashMap<String, String>) -> EngineResult<Self> {
        let options = interpolate_map(&config.options, variables)?;
        let docker = match options.get("addr") {
            Some(addr) if addr.starts_with("ssh://") => {
                // bollard's local/http/https transports don't speak SSH;
                // an ssh:// addr here means "reach this daemon through the
                // ssh backend's tunneled command path instead" (DESIGN.md
                // open question resolution), not a direct socket dial.
                return Err(EngineError::configuration(
                    "docker backends with ssh:// addr must be reached via the ssh adapter",
                ));
            }
            Some(addr) => Docker::connect_with_http(addr, 30, bollard::API_DEFAULT_VERSION)
                .map_err(|e| EngineError::transport("docker", e.to_string()))?,
            None => Docker::connect_with_local_defaults()
                .map_err(|e| EngineError::transport("docker", e.to_string()))?,
        };
        Ok(Self {
            docker,
            project: options.get("project").cloned(),
        })
    }

    async fn resolve_container_ids(&self, query: &Query) -> EngineResult<Vec<String>> {
        let options = interpolate_map(&query.options, &query.variables)?;
        if let Some(id) = options.get("container") {
            return Ok(vec![id.clone()]);
        }
        let service = options
            .get("service")
            .ok_or_else(|| EngineError::configuration("docker query requires 'container' or 'service'"))?;

        let mut filters = HashMap::new();
        filters.insert("label".to_string(), vec![format!("com.docker.compose.service={service}")]);
        if let Some(project) = &self.project {
            filters
                .get_mut("label")
                .expect("just inserted above")
                .push(format!("com.docker.compose.project={project}"));
        }
        let containers = self
            .docker
            .list_containers(Some(ListContainersOptions {
                all: false,
                filters,
                ..Default::default()
            }))
            .await
            .map_err(|e| EngineError::transport("docker", e.to_string()))?;

        let ids: Vec<String> = containers.into_iter().filter_map(|c| c.id).collect();
        if ids.is_empty() {
            return Err(EngineError::transport("docker", format!("no running containers for service '{service}'")));
        }
        Ok(ids)
    }
}

#[async_trait]
impl SourceAdapter for DockerAdapter {
    async fn query(&self, query: Query) -> EngineResult<QueryResult> {
        let container_ids = self.resolve_container_ids(&query).await?;
        // Multiple matches (service discovery without a pinned container)
        // fan out the same way the Kubernetes label-selector path does;
        // here we query the first and let callers pin `container` for a
        // specific instance. resolve_container_ids never returns Ok(vec![]).
        let container_id = container_ids
            .into_iter()
            .next()
            .expect("resolve_container_ids returns an error on empty results");
        debug!(container_id, "streaming docker container logs");

        let opts = build_logs_options(&query, chrono::Utc::now());
        let stream = self.docker.logs(&container_id, Some(opts));

        // bollard demultiplexes stdout/stderr into `LogOutput` frames
        // already; re-serialize into a byte stream the generic reader can
        // consume uniformly with every other text backend.
        let byte_stream = Box::pin(stream.filter_map(|chunk| async move {
            match chunk {
                Ok(output) => Some(Ok::<_, std::io::Error>(output.into_bytes())),
                Err(e) => Some(Err(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))),
            }
        }));
        let async_read = tokio_util_stream_reader(byte_stream);

        if query.follow {
            let cancel = CancelToken::new();
            let field_extraction = query.field_extraction.clone();
            let filter = query.effective_filter();
            let pre_filtered = query.is_pre_filtered();
            let (batch_rx, err_rx) =
                crate::reader::read_follow(async_read, field_extraction, filter, pre_filtered, cancel, || async { None });
            return Ok(QueryResult {
                initial: Vec::new(),
                follow_rx: Some(batch_rx),
                error_rx: Some(err_rx),
                discovered_fields: Default::default(),
                next_page_token: None,
            });
        }

        let output = read_bounded(
            async_read,
            query.field_extraction.clone(),
            query.effective_filter(),
            query.is_pre_filtered(),
            query.size,
        )
        .await
        .map_err(|e| EngineError::stream(e.to_string()))?;
        Ok(output.into())
    }

    async fn get_field_values(&self, query: Query, fields: &[String]) -> EngineResult<FieldValues> {
        field_values_from_entries(self, query, fields).await
    }
}

/// Adapt a `Stream<Item = io::Result<Vec<u8>>>` into `AsyncRead`, the
/// shape the generic reader pipeline consumes uniformly across backends.
fn tokio_util_stream_reader<S>(stream: S) -> impl tokio::io::AsyncRead + Unpin
where
    S: Stream<Item = std::io::Result<bytes::Bytes>> + Unpin,
{
    tokio_util::io::StreamReader::new(stream)
}
