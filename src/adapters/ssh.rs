//! SSH hybrid adapter: dials the remote host, runs the `hl`-or-fallback
//! one-liner, and watches the `HL_ENGINE` marker on stderr to decide
//! whether the remote already filtered server-side (spec §4.5, §4.6).

use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::oneshot;
use tracing::debug;

use crate::adapters::{field_values_from_entries, QueryResult, SourceAdapter};
use crate::config::BackendConfig;
use crate::errors::{EngineError, EngineResult};
use crate::models::{FieldValues, Query};
use crate::reader::{read_bounded, read_follow};
use crate::ssh::{build_command, MarkerMode};
use crate::util::cancel::CancelToken;
use crate::util::interpolate::interpolate_map;

pub struct SshAdapter {
    user: Option<String>,
    addr: String,
    private_key: Option<String>,
    paths: Vec<String>,
}

impl SshAdapter {
    pub fn new(config: &BackendConfig, variables: &HashMap<String, String>) -> EngineResult<Self> {
        let options = interpolate_map(&config.options, variables)?;
        let addr = options
            .get("addr")
            .ok_or_else(|| EngineError::configuration("ssh backend missing 'addr'"))?
            .clone();
        let paths = options
            .get("paths")
            .map(|p| p.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or_default();
        Ok(Self {
            user: options.get("user").cloned(),
            addr,
            private_key: options.get("privateKey").cloned(),
            paths,
        })
    }

    fn destination(&self) -> String {
        match &self.user {
            Some(user) => format!("{user}@{}", self.addr),
            None => self.addr.clone(),
        }
    }
}

#[async_trait]
impl SourceAdapter for SshAdapter {
    async fn query(&self, query: Query) -> EngineResult<QueryResult> {
        let remote_command = build_command(&query, &self.paths, MarkerMode(true));
        debug!(destination = %self.destination(), "executing ssh hybrid command");

        let mut cmd = Command::new("ssh");
        if let Some(key) = &self.private_key {
            cmd.arg("-i").arg(key);
        }
        cmd.arg(self.destination()).arg(remote_command);

        let mut child = cmd
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(EngineError::from)?;
        let stdout = child.stdout.take().ok_or_else(|| EngineError::stream("ssh produced no stdout"))?;
        let mut stderr = BufReader::new(child.stderr.take().ok_or_else(|| EngineError::stream("ssh produced no stderr"))?);

        let (marker_tx, marker_rx) = oneshot::channel();
        tokio::spawn(async move {
            let mut line = String::new();
            let detected = match stderr.read_line(&mut line).await {
                Ok(n) if n > 0 => line.trim().contains("HL_ENGINE=hl"),
                _ => false,
            };
            let _ = marker_tx.send(detected);
        });
        let remote_ran_hl = tokio::time::timeout(Duration::from_secs(5), marker_rx)
            .await
            .ok()
            .and_then(Result::ok)
            .unwrap_or(false);

        let mut effective_query = query.deep_copy();
        if remote_ran_hl {
            effective_query.mark_pre_filtered();
        }

        if effective_query.follow {
            let cancel = CancelToken::new();
            let on_close = move || async move {
                match child.wait().await {
                    Ok(status) if !status.success() => Some(format!("ssh session exited with {status}")),
                    Err(e) => Some(format!("failed to reap ssh process: {e}")),
                    _ => None,
                }
            };
            let (batch_rx, err_rx) = read_follow(
                stdout,
                effective_query.field_extraction.clone(),
                effective_query.effective_filter(),
                effective_query.is_pre_filtered(),
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
            effective_query.field_extraction.clone(),
            effective_query.effective_filter(),
            effective_query.is_pre_filtered(),
            effective_query.size,
        )
        .await
        .map_err(|e| EngineError::stream(e.to_string()))?;

        let status = child.wait().await.map_err(EngineError::from)?;
        if !status.success() {
            return Err(EngineError::transport("ssh", format!("session exited with {status}")));
        }

        Ok(output.into())
    }

    async fn get_field_values(&self, query: Query, fields: &[String]) -> EngineResult<FieldValues> {
        field_values_from_entries(self, query, fields).await
    }
}
