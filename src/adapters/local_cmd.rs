//! local-cmd adapter: runs a user-provided shell command template and
//! streams its stdout through the generic reader pipeline (spec §4.4,
//! §4.6 "CloudWatch, local-cmd").

use std::collections::HashMap;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::adapters::{field_values_from_entries, QueryResult, SourceAdapter};
use crate::config::BackendConfig;
use crate::errors::{EngineError, EngineResult};
use crate::models::FieldValues;
use crate::models::Query;
use crate::reader::{read_bounded, read_follow};
use crate::translate::hl::render_filter;
use crate::translate::local_cmd::render_template;
use crate::util::cancel::CancelToken;
use crate::util::interpolate::interpolate_map;

pub struct LocalCmdAdapter {
    template: String,
}

impl LocalCmdAdapter {
    pub fn new(config: &BackendConfig, variables: &HashMap<String, String>) -> EngineResult<Self> {
        let options = interpolate_map(&config.options, variables)?;
        let template = options
            .get("cmd")
            .ok_or_else(|| EngineError::configuration("local_cmd backend missing 'cmd'"))?
            .clone();
        Ok(Self { template })
    }
}

#[async_trait]
impl SourceAdapter for LocalCmdAdapter {
    async fn query(&self, query: Query) -> EngineResult<QueryResult> {
        let filter = query.effective_filter();
        let rendered = render_template(&self.template, &query, &render_filter(&filter))?;
        debug!(cmd = %rendered, "executing local-cmd backend");

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&rendered)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(EngineError::from)?;
        let stdout = child.stdout.take().ok_or_else(|| EngineError::stream("child produced no stdout"))?;

        if query.follow {
            let cancel = CancelToken::new();
            let mut stderr = child.stderr.take();
            let on_close = move || async move {
                use tokio::io::AsyncReadExt;
                let mut buf = String::new();
                if let Some(stderr) = stderr.as_mut() {
                    let _ = stderr.read_to_string(&mut buf).await;
                }
                match child.wait().await {
                    Ok(status) if !status.success() => Some(format!("command exited with {status}: {buf}")),
                    Err(e) => Some(format!("failed to reap child: {e}")),
                    _ => None,
                }
            };
            let (batch_rx, err_rx) = read_follow(
                stdout,
                query.field_extraction.clone(),
                query.effective_filter(),
                query.is_pre_filtered(),
                cancel,
                on_close,
            );
            return Ok(QueryResult {
                initial: Vec::new(),
                follow_rx: Some(batch_rx),
                error_rx: Some(err_rx),
                discovered_fields: Default::default(),
                next_page_token: None,
            });
        }

        let output = read_bounded(
            stdout,
            query.field_extraction.clone(),
            query.effective_filter(),
            query.is_pre_filtered(),
            query.size,
        )
        .await
        .map_err(|e| EngineError::stream(e.to_string()))?;

        let status = child.wait().await.map_err(EngineError::from)?;
        if !status.success() {
            return Err(EngineError::stream(format!("command exited with {status}")));
        }

        Ok(output.into())
    }

    async fn get_field_values(&self, query: Query, fields: &[String]) -> EngineResult<FieldValues> {
        field_values_from_entries(self, query, fields).await
    }
}
