//! Errors raised while talking to the cluster through kubectl.

use thiserror::Error;

/// Result type alias for kubectl-backed operations.
pub type Result<T> = std::result::Result<T, KubectlError>;

/// Stderr fragments that mean the cluster could not be reached at all.
const NOT_CONNECTED_MARKERS: &[&str] = &[
    "connection refused",
    "no configuration has been provided",
    "dial tcp",
    "unable to connect to the server",
    "i/o timeout",
];

/// Stderr fragments that mean the requested object does not exist.
const NOT_FOUND_MARKERS: &[&str] = &["(notfound)", "notfound", "not found"];

/// Errors from kubectl invocations and forwarding child processes.
#[derive(Error, Debug)]
pub enum KubectlError {
    /// kubectl binary could not be located.
    #[error("kubectl not found; install it or set kubectlPath in the config")]
    KubectlNotFound,

    /// kubectl ran and exited non-zero.
    #[error("kubectl failed: {0}")]
    CommandFailed(String),

    /// The object kubectl was asked for does not exist.
    #[error("kubectl reported not found: {0}")]
    NotFound(String),

    /// The API server could not be reached.
    #[error("cluster not reachable: {0}")]
    ClusterNotConnected(String),

    /// kubectl output could not be decoded.
    #[error("failed to parse kubectl output: {0}")]
    ParsingFailed(String),

    /// kubectl did not answer within the request timeout.
    #[error("kubectl timed out")]
    Timeout,

    /// I/O error while spawning or reading a child.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A forwarding child process misbehaved.
    #[error("process error: {0}")]
    ProcessError(String),

    /// Bound ports were queried before the forwarder reported any.
    #[error("forwarded ports not available yet")]
    PortsNotReady,

    /// Cluster configuration problem.
    #[error("configuration error: {0}")]
    ConfigError(String),
}

impl KubectlError {
    /// Classifies kubectl stderr into a typed error.
    pub fn from_kubectl_error(stderr: &str) -> Self {
        let message = stderr.trim().to_string();
        let lower = message.to_lowercase();

        if NOT_CONNECTED_MARKERS.iter().any(|m| lower.contains(m)) {
            return Self::ClusterNotConnected(message);
        }
        if NOT_FOUND_MARKERS.iter().any(|m| lower.contains(m)) {
            return Self::NotFound(message);
        }
        Self::CommandFailed(message)
    }

    /// Whether the error means the cluster itself is unreachable.
    pub fn is_cluster_not_connected(&self) -> bool {
        matches!(self, Self::ClusterNotConnected(_))
    }

    /// Whether the error means the requested object is absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kubectl_error_detection() {
        let connection_refused = KubectlError::from_kubectl_error("connection refused");
        assert!(connection_refused.is_cluster_not_connected());

        let no_config = KubectlError::from_kubectl_error("no configuration has been provided");
        assert!(no_config.is_cluster_not_connected());

        let dial_error = KubectlError::from_kubectl_error("dial tcp 127.0.0.1:6443: connect");
        assert!(dial_error.is_cluster_not_connected());

        let other_error = KubectlError::from_kubectl_error("some other error");
        assert!(!other_error.is_cluster_not_connected());
        assert!(!other_error.is_not_found());
    }

    #[test]
    fn test_not_found_detection() {
        let err = KubectlError::from_kubectl_error(
            "Error from server (NotFound): pods \"metrics-0\" not found\n",
        );
        assert!(err.is_not_found());
        assert_eq!(
            err.to_string(),
            "kubectl reported not found: Error from server (NotFound): pods \"metrics-0\" not found"
        );
    }
}
