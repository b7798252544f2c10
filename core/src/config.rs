//! Configuration for cluster access and saved forwarding targets.
//!
//! Stored as JSON at `~/.perfman/config.json`. Every field is optional in
//! the file; missing fields take their defaults.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::{Error, Result};
use crate::portforward::TargetOption;

/// Namespace used when neither an option nor the config names one.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Local address tunnels bind to by default.
pub const DEFAULT_ADDRESS: &str = "127.0.0.1";

/// Environment variable consulted when no kubeconfig is configured.
pub const KUBECONFIG_ENV: &str = "KUBECONFIG";

/// Persisted configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default = "default_namespace")]
    pub default_namespace: String,

    /// Explicit kubectl binary; searched for when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubectl_path: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubeconfig: Option<PathBuf>,

    /// kubeconfig context; the current context when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,

    #[serde(default = "default_address")]
    pub address: String,

    /// Timeout for a single control-plane query.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Saved targets by name. Override built-in presets of the same name.
    #[serde(default)]
    pub targets: BTreeMap<String, TargetOption>,
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_address() -> String {
    DEFAULT_ADDRESS.to_string()
}

fn default_request_timeout_secs() -> u64 {
    15
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_namespace: default_namespace(),
            kubectl_path: None,
            kubeconfig: None,
            context: None,
            address: default_address(),
            request_timeout_secs: default_request_timeout_secs(),
            targets: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Built-in presets merged with the saved targets.
    pub fn presets(&self) -> BTreeMap<String, TargetOption> {
        let mut presets = builtin_presets();
        presets.extend(self.targets.clone());
        presets
    }

    /// Looks up a preset by name.
    pub fn preset(&self, name: &str) -> Option<TargetOption> {
        self.targets
            .get(name)
            .cloned()
            .or_else(|| builtin_presets().remove(name))
    }

    /// Settings the forwarding core needs, with `KUBECONFIG` applied when
    /// no kubeconfig is configured.
    pub fn cluster_config(&self) -> ClusterConfig {
        let kubeconfig = self.kubeconfig.clone().or_else(|| {
            std::env::var_os(KUBECONFIG_ENV)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
        });

        ClusterConfig {
            default_namespace: self.default_namespace.clone(),
            server: String::new(),
            address: self.address.clone(),
            kubectl_path: self.kubectl_path.clone(),
            kubeconfig,
            context: self.context.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }
}

/// Targets of the monitoring stack deployed alongside the tool.
pub fn builtin_presets() -> BTreeMap<String, TargetOption> {
    BTreeMap::from([
        (
            "prometheus".to_string(),
            TargetOption::from_source("svc/perfman-kube-prometheus-prometheus", 9090)
                .with_remote_port(9090),
        ),
        (
            "grafana".to_string(),
            TargetOption::from_source("svc/perfman-grafana", 3000),
        ),
    ])
}

/// Resolved settings for talking to one cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterConfig {
    pub default_namespace: String,
    /// API server URL. Empty until discovered from the kubeconfig.
    pub server: String,
    pub address: String,
    pub kubectl_path: Option<PathBuf>,
    pub kubeconfig: Option<PathBuf>,
    pub context: Option<String>,
    pub request_timeout: Duration,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            default_namespace: default_namespace(),
            server: String::new(),
            address: default_address(),
            kubectl_path: None,
            kubeconfig: None,
            context: None,
            request_timeout: Duration::from_secs(default_request_timeout_secs()),
        }
    }
}

/// Reads and writes [`Config`] on disk.
pub struct ConfigStore {
    config_path: PathBuf,
}

impl ConfigStore {
    /// Store at `~/.perfman/config.json`.
    pub fn new() -> Result<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))?;

        Ok(Self {
            config_path: home.join(".perfman").join("config.json"),
        })
    }

    /// Store at a custom path (for testing).
    pub fn with_path(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    pub fn config_path(&self) -> &PathBuf {
        &self.config_path
    }

    /// Load configuration from disk.
    ///
    /// Returns default config if the file doesn't exist.
    pub async fn load(&self) -> Result<Config> {
        if !self.config_path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(&self.config_path)
            .await
            .map_err(|e| Error::Config(format!("Failed to read config: {}", e)))?;

        serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Save configuration, creating the directory if needed.
    pub async fn save(&self, config: &Config) -> Result<()> {
        if let Some(dir) = self.config_path.parent() {
            if !dir.exists() {
                fs::create_dir_all(dir).await.map_err(|e| {
                    Error::Config(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        let content = serde_json::to_string_pretty(config)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;

        // Write to a temp file then rename so readers never see half a file
        let temp_path = self.config_path.with_extension("json.tmp");

        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(|e| Error::Config(format!("Failed to create temp config file: {}", e)))?;

        file.write_all(content.as_bytes())
            .await
            .map_err(|e| Error::Config(format!("Failed to write config: {}", e)))?;

        file.sync_all()
            .await
            .map_err(|e| Error::Config(format!("Failed to sync config: {}", e)))?;

        fs::rename(&temp_path, &self.config_path)
            .await
            .map_err(|e| Error::Config(format!("Failed to rename config file: {}", e)))?;

        Ok(())
    }

    /// Save a named target, replacing any previous one of that name.
    pub async fn save_target(&self, name: &str, option: TargetOption) -> Result<()> {
        let mut config = self.load().await?;
        config.targets.insert(name.to_string(), option);
        self.save(&config).await
    }

    /// Remove a saved target. Returns whether it existed.
    pub async fn remove_target(&self, name: &str) -> Result<bool> {
        let mut config = self.load().await?;
        let removed = config.targets.remove(name).is_some();
        if removed {
            self.save(&config).await?;
        }
        Ok(removed)
    }
}
