//! Error types for the perfman-core library.

use thiserror::Error;

use crate::kubernetes::errors::KubectlError;
use crate::portforward::ForwardError;

/// Result type alias for perfman operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the library's outer layers.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Kubernetes/kubectl error.
    #[error("Kubernetes error: {0}")]
    Kubernetes(#[from] KubectlError),

    /// Port forwarding error.
    #[error(transparent)]
    Forward(#[from] ForwardError),
}
