//! Backend configuration schema (spec §6) and `${VAR}`/`${VAR:-default}`
//! interpolation, loaded from a `CONFIG_FILE` env var (falling back to a
//! conventional default path). Unlike the config layer this was modeled
//! on, there's no sane default backend topology to fall back on, so a
//! missing file is a configuration error rather than something to write
//! out fresh.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::errors::{EngineError, EngineResult};

/// The adapter tag selecting which backend implementation a named config
/// entry resolves to (spec §6 "Backend option schema").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendType {
    Elasticsearch,
    Splunk,
    Hl,
    Docker,
    Kubernetes,
    Ssh,
    Cloudwatch,
    LocalCmd,
}

/// One named backend's configuration: its adapter type plus an
/// adapter-specific option bag (endpoint, url, index, container, service,
/// project, pod, labelSelector, namespace, paths, cmd, kubeConfig, user,
/// addr, privateKey, headers, searchBody, pollIntervalSeconds, maxRetries,
/// insecureSkipTLSVerify — spec §6). Values are interpolated lazily, at
/// adapter-construction time, not at load time, so a reference to an
/// environment variable set after config load still resolves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(rename = "type")]
    pub backend_type: BackendType,
    #[serde(flatten)]
    pub options: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backends: HashMap<String, BackendConfig>,
}

impl Config {
    pub fn load() -> EngineResult<Self> {
        let config_file = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "logviewer.toml".to_string());
        Self::load_from(&PathBuf::from(config_file))
    }

    pub fn load_from(path: &std::path::Path) -> EngineResult<Self> {
        if !path.exists() {
            return Err(EngineError::configuration(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents)
            .map_err(|e| EngineError::configuration(format!("invalid config at {}: {e}", path.display())))
    }

    pub fn backend(&self, name: &str) -> EngineResult<&BackendConfig> {
        self.backends
            .get(name)
            .ok_or_else(|| EngineError::UnknownBackend(name.to_string()))
    }
}

/// Well-known environment variables consumed outside of `${VAR}`
/// interpolation (spec §6 "Environment variables consumed").
pub mod env {
    pub const DISABLE_RUN_ID_FILTER: &str = "DISABLE_RUN_ID_FILTER";
    pub const TLS_INSECURE: &str = "LOGVIEWER_TLS_INSECURE";
    pub const AUTO_K3S: &str = "LOGVIEWER_AUTO_K3S";
}
