//! Cluster access through kubectl.
//!
//! - [`KubectlClient`] answers pod and service lookups with `kubectl get`
//! - [`KubectlForwardSession`] drives one `kubectl port-forward` child

pub mod client;
pub mod errors;
pub mod models;
pub mod session;

pub use client::KubectlClient;
pub use errors::{KubectlError, Result};
pub use models::{Pod, Service};
pub use session::KubectlForwardSession;
