//! Forwarding transport port (interface).

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::kubernetes::errors::Result;
use crate::portforward::signal::ReadySignal;

/// One bound local port and the container port it reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForwardedPort {
    pub local: u16,
    pub remote: u16,
}

/// Everything a transport needs to open one tunnel.
#[derive(Debug, Clone)]
pub struct ForwardRequest {
    pub namespace: String,
    pub pod_name: String,
    /// Desired local port; 0 lets the transport pick one.
    pub local_port: u16,
    pub remote_port: u16,
    /// Local address to bind.
    pub address: String,
    /// Portforward subresource URL of the pod.
    pub url: String,
    /// Fires when the tunnel should shut down.
    pub stop: CancellationToken,
    /// Fired by the session once the local port accepts connections.
    pub ready: ReadySignal,
}

impl ForwardRequest {
    /// The `local:remote` mapping understood by port-forward tooling.
    pub fn port_mapping(&self) -> String {
        if self.local_port == 0 {
            format!(":{}", self.remote_port)
        } else {
            format!("{}:{}", self.local_port, self.remote_port)
        }
    }
}

/// Builds the portforward subresource URL for a pod.
pub fn portforward_path(host: &str, namespace: &str, pod: &str) -> String {
    format!(
        "{}/api/v1/namespaces/{}/pods/{}/portforward",
        host.trim_end_matches('/'),
        namespace,
        pod
    )
}

/// A live forwarding session.
pub trait ForwardSession: Send + Sync + 'static {
    /// Run the accept loop until the request's stop signal fires.
    ///
    /// Returns `Err` when forwarding breaks down on its own.
    fn forward_ports(
        self: std::sync::Arc<Self>,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// The local ports currently bound by this session.
    fn ports(&self) -> Result<Vec<ForwardedPort>>;
}
