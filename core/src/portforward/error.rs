//! Errors raised while setting up or running a set of tunnels.

use thiserror::Error;

use crate::kubernetes::KubectlError;

/// Result type alias for forwarding operations.
pub type Result<T> = std::result::Result<T, ForwardError>;

#[derive(Error, Debug)]
pub enum ForwardError {
    /// `source` was not `<kind>/<name>` with a known kind.
    #[error("invalid source: {0}")]
    InvalidSource(String),

    /// An option named neither a pod nor a service.
    #[error("option {index}: please provide a name for a pod or service")]
    MissingTarget { index: usize },

    /// An option named both a pod and a service, with no `source` to decide.
    #[error("option {index}: set either a pod or a service name, not both")]
    AmbiguousTarget { index: usize },

    /// The named object (or any pod behind a service) does not exist.
    #[error("no such {kind}: {namespace}/{name}")]
    NotFound {
        kind: &'static str,
        namespace: String,
        name: String,
    },

    /// The resolved pod declares no container port to default to.
    #[error("pod {namespace}/{pod} exposes no container port")]
    NoExposablePort { namespace: String, pod: String },

    /// The transport could not construct a forwarder.
    #[error("failed to establish tunnel to {target}: {source}")]
    Establishment {
        target: String,
        #[source]
        source: KubectlError,
    },

    /// A tunnel that was already forwarding broke down.
    #[error("tunnel to {target} failed: {source}")]
    ForwardingFault {
        target: String,
        #[source]
        source: KubectlError,
    },

    /// A tunnel closed before its local port became ready.
    #[error("tunnel to {target} closed before becoming ready")]
    NotReady { target: String },

    /// Bound ports could not be read from a ready tunnel.
    #[error("failed to get ports for {target}: {source}")]
    Ports {
        target: String,
        #[source]
        source: KubectlError,
    },

    /// A setup task panicked or was cancelled by the runtime.
    #[error("setup task failed: {0}")]
    TaskFailed(String),

    /// Control-plane query failed.
    #[error(transparent)]
    Cluster(#[from] KubectlError),
}
