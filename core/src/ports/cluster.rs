//! Cluster control-plane port (interface).

use std::sync::Arc;

use crate::kubernetes::errors::Result;
use crate::kubernetes::models::{Pod, Service};

use super::transport::{ForwardRequest, ForwardSession};

/// Port for querying cluster state and opening forwarding connections.
///
/// Lookups return `Ok(None)` when the object does not exist; `Err` is
/// reserved for failures to ask at all.
pub trait ControlPlane: Send + Sync + 'static {
    /// Forwarding session produced by [`ControlPlane::open_forward`].
    type Session: ForwardSession;

    /// Fetch a pod by namespace and name.
    fn get_pod(
        &self,
        namespace: &str,
        name: &str,
    ) -> impl std::future::Future<Output = Result<Option<Pod>>> + Send;

    /// Fetch a service by namespace and name.
    fn get_service(
        &self,
        namespace: &str,
        name: &str,
    ) -> impl std::future::Future<Output = Result<Option<Service>>> + Send;

    /// List at most `limit` pods in `namespace` matching `label_selector`.
    fn list_pods(
        &self,
        namespace: &str,
        label_selector: &str,
        limit: usize,
    ) -> impl std::future::Future<Output = Result<Vec<Pod>>> + Send;

    /// Upgrade a connection to the pod's portforward subresource.
    ///
    /// Resolves once the forwarder exists, not once its local port is bound;
    /// readiness is reported through `request.ready`.
    fn open_forward(
        &self,
        request: ForwardRequest,
    ) -> impl std::future::Future<Output = Result<Arc<Self::Session>>> + Send;
}
