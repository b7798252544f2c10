//! Cluster queries through the kubectl binary.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tokio::process::Command;
use tokio::time::timeout;

use crate::config::ClusterConfig;
use crate::ports::{ControlPlane, ForwardRequest};

use super::errors::{KubectlError, Result};
use super::models::{Pod, PodListResponse, Service};
use super::session::KubectlForwardSession;

/// Default paths to search for kubectl.
const KUBECTL_PATHS: &[&str] = &[
    "/opt/homebrew/bin/kubectl", // Apple Silicon
    "/usr/local/bin/kubectl",    // Intel Mac / Homebrew
    "/usr/bin/kubectl",          // System
];

/// Control plane backed by `kubectl`.
#[derive(Debug, Clone)]
pub struct KubectlClient {
    kubectl_path: Option<PathBuf>,
    kubeconfig: Option<PathBuf>,
    context: Option<String>,
    request_timeout: Duration,
}

impl KubectlClient {
    /// Client for the cluster described by `config`.
    ///
    /// Uses the configured kubectl binary, else the first one found in the
    /// well-known locations or on `PATH`.
    pub fn new(config: &ClusterConfig) -> Self {
        let kubectl_path = config
            .kubectl_path
            .clone()
            .or_else(|| find_executable(KUBECTL_PATHS))
            .or_else(|| find_in_path("kubectl"));

        Self {
            kubectl_path,
            kubeconfig: config.kubeconfig.clone(),
            context: config.context.clone(),
            request_timeout: config.request_timeout,
        }
    }

    pub fn kubectl_path(&self) -> Option<&PathBuf> {
        self.kubectl_path.as_ref()
    }

    pub fn is_kubectl_available(&self) -> bool {
        self.kubectl_path.is_some()
    }

    /// Flags selecting the kubeconfig and context, passed to every call.
    pub fn base_args(&self) -> Vec<OsString> {
        let mut args = Vec::new();
        if let Some(kubeconfig) = &self.kubeconfig {
            args.push(OsString::from("--kubeconfig"));
            args.push(kubeconfig.clone().into_os_string());
        }
        if let Some(context) = &self.context {
            args.push(OsString::from("--context"));
            args.push(OsString::from(context));
        }
        args
    }

    /// API server URL of the selected context.
    pub async fn server_url(&self) -> Result<String> {
        let output = self
            .execute_kubectl(&[
                "config",
                "view",
                "--minify",
                "-o",
                "jsonpath={.clusters[0].cluster.server}",
            ])
            .await?;

        let server = output.trim();
        if server.is_empty() {
            return Err(KubectlError::ConfigError(
                "current context has no cluster server".to_string(),
            ));
        }
        Ok(server.to_string())
    }

    /// `kubectl get <resource>` decoded as `T`; `Ok(None)` when it does not exist.
    async fn get_object<T: DeserializeOwned>(
        &self,
        resource: &str,
        namespace: &str,
        name: &str,
    ) -> Result<Option<T>> {
        let request_timeout = self.request_timeout_arg();
        let result = self
            .execute_kubectl(&[
                "get",
                resource,
                name,
                "-n",
                namespace,
                "-o",
                "json",
                &request_timeout,
            ])
            .await;

        match result {
            Ok(output) => serde_json::from_str(&output)
                .map(Some)
                .map_err(|e| KubectlError::ParsingFailed(e.to_string())),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn request_timeout_arg(&self) -> String {
        format!("--request-timeout={}s", self.request_timeout.as_secs().max(1))
    }

    /// Executes a kubectl command and returns its stdout.
    async fn execute_kubectl(&self, args: &[&str]) -> Result<String> {
        let kubectl_path = self
            .kubectl_path
            .as_ref()
            .ok_or(KubectlError::KubectlNotFound)?;

        tracing::debug!(args = ?args, "Running kubectl");

        let result = timeout(self.request_timeout, async {
            let output = Command::new(kubectl_path)
                .args(self.base_args())
                .args(args)
                .kill_on_drop(true)
                .output()
                .await?;

            Ok::<_, std::io::Error>((output.status, output.stdout, output.stderr))
        })
        .await;

        match result {
            Ok(Ok((status, stdout, stderr))) => {
                if status.success() {
                    String::from_utf8(stdout)
                        .map_err(|e| KubectlError::ParsingFailed(e.to_string()))
                } else {
                    let stderr_str = String::from_utf8_lossy(&stderr);
                    Err(KubectlError::from_kubectl_error(&stderr_str))
                }
            }
            Ok(Err(e)) => Err(KubectlError::Io(e)),
            Err(_) => Err(KubectlError::Timeout),
        }
    }
}

impl ControlPlane for KubectlClient {
    type Session = KubectlForwardSession;

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<Pod>> {
        self.get_object("pod", namespace, name).await
    }

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>> {
        self.get_object("service", namespace, name).await
    }

    async fn list_pods(
        &self,
        namespace: &str,
        label_selector: &str,
        limit: usize,
    ) -> Result<Vec<Pod>> {
        // A service without a selector fronts no pods.
        if label_selector.is_empty() {
            return Ok(Vec::new());
        }

        // `kubectl get` has no result cap; the list is cut down below.
        let request_timeout = self.request_timeout_arg();
        let output = self
            .execute_kubectl(&[
                "get",
                "pods",
                "-n",
                namespace,
                "-l",
                label_selector,
                "-o",
                "json",
                &request_timeout,
            ])
            .await?;

        let response: PodListResponse = serde_json::from_str(&output)
            .map_err(|e| KubectlError::ParsingFailed(e.to_string()))?;

        let mut pods = response.items;
        pods.truncate(limit);
        Ok(pods)
    }

    async fn open_forward(&self, request: ForwardRequest) -> Result<Arc<KubectlForwardSession>> {
        let kubectl_path = self
            .kubectl_path
            .as_ref()
            .ok_or(KubectlError::KubectlNotFound)?;

        let session = KubectlForwardSession::spawn(kubectl_path, self.base_args(), request)?;
        Ok(Arc::new(session))
    }
}

/// Finds an executable in the given paths.
fn find_executable(paths: &[&str]) -> Option<PathBuf> {
    paths.iter().map(PathBuf::from).find(|p| p.exists())
}

/// Finds `name` in the directories listed by `PATH`.
fn find_in_path(name: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(name))
        .find(|candidate| is_file(candidate))
}

fn is_file(path: &Path) -> bool {
    path.metadata().map(|m| m.is_file()).unwrap_or(false)
}
