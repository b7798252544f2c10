//! Resolves validated options to one concrete pod and container port each.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::kubernetes::models::Pod;
use crate::ports::ControlPlane;

use super::error::{ForwardError, Result};
use super::group::TaskGroup;
use super::options::{NormalizedOption, TargetKind};

/// At most this many pods are listed when picking one behind a service.
const SERVICE_POD_LIMIT: usize = 1;

/// The pod and ports one tunnel will connect.
///
/// Carries only the pod's identity, never the pod object itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedTarget {
    namespace: String,
    pod_name: String,
    local_port: u16,
    remote_port: u16,
}

impl ResolvedTarget {
    pub fn new(namespace: &str, pod_name: &str, local_port: u16, remote_port: u16) -> Self {
        Self {
            namespace: namespace.to_string(),
            pod_name: pod_name.to_string(),
            local_port,
            remote_port,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn pod_name(&self) -> &str {
        &self.pod_name
    }

    pub fn local_port(&self) -> u16 {
        self.local_port
    }

    /// Never 0.
    pub fn remote_port(&self) -> u16 {
        self.remote_port
    }
}

impl fmt::Display for ResolvedTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} {}:{}",
            self.namespace, self.pod_name, self.local_port, self.remote_port
        )
    }
}

/// Resolves one option against the cluster.
///
/// A service target picks the first pod its selector lists; when several
/// pods match, which one the cluster returns first is unspecified.
pub async fn locate<C: ControlPlane>(
    client: &C,
    option: &NormalizedOption,
) -> Result<ResolvedTarget> {
    let pod = match option.kind {
        TargetKind::Pod => client
            .get_pod(&option.namespace, &option.name)
            .await?
            .ok_or_else(|| ForwardError::NotFound {
                kind: "pod",
                namespace: option.namespace.clone(),
                name: option.name.clone(),
            })?,
        TargetKind::Service => {
            let service = client
                .get_service(&option.namespace, &option.name)
                .await?
                .ok_or_else(|| ForwardError::NotFound {
                    kind: "service",
                    namespace: option.namespace.clone(),
                    name: option.name.clone(),
                })?;

            let selector = service.label_selector();
            let pod = client
                .list_pods(&option.namespace, &selector, SERVICE_POD_LIMIT)
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| ForwardError::NotFound {
                    kind: "pods for service",
                    namespace: option.namespace.clone(),
                    name: option.name.clone(),
                })?;

            tracing::info!(
                service = %option.name,
                pod = %pod.name(),
                namespace = %option.namespace,
                "Forwarding service"
            );
            pod
        }
    };

    build_target(option, &pod)
}

fn build_target(option: &NormalizedOption, pod: &Pod) -> Result<ResolvedTarget> {
    let remote_port = match option.remote_port {
        0 => pod
            .first_container_port()
            .filter(|p| *p != 0)
            .ok_or_else(|| ForwardError::NoExposablePort {
                namespace: option.namespace.clone(),
                pod: pod.name().to_string(),
            })?,
        port => port,
    };

    // kubectl leaves metadata.namespace empty on some list outputs.
    let namespace = if pod.namespace().is_empty() {
        option.namespace.as_str()
    } else {
        pod.namespace()
    };

    Ok(ResolvedTarget::new(
        namespace,
        pod.name(),
        option.local_port,
        remote_port,
    ))
}

/// Resolves every option in its own task and returns targets in input order.
///
/// Every lookup runs to completion even when one fails; the first failure
/// is returned afterwards.
pub async fn resolve_all<C: ControlPlane>(
    client: Arc<C>,
    options: Vec<NormalizedOption>,
) -> Result<Vec<ResolvedTarget>> {
    let mut group = TaskGroup::new();

    for option in options {
        let client = client.clone();
        group.spawn(async move { locate(client.as_ref(), &option).await });
    }

    group.wait().await
}
