//! Minimal in-memory cluster built only on the public traits.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use perfman_core::kubernetes::models::{parse_label_selector, Pod, Service};
use perfman_core::kubernetes::Result;
use perfman_core::ports::{ControlPlane, ForwardRequest, ForwardSession, ForwardedPort};

#[derive(Default)]
pub struct MemoryCluster {
    pods: Vec<Pod>,
    services: Vec<Service>,
    calls: AtomicUsize,
    stopped: Arc<AtomicUsize>,
}

impl MemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pod(mut self, pod: Pod) -> Self {
        self.pods.push(pod);
        self
    }

    pub fn with_service(mut self, service: Service) -> Self {
        self.services.push(service);
        self
    }

    /// Number of control-plane calls of any kind.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Sessions that exited because their stop signal fired.
    pub fn stopped(&self) -> usize {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl ControlPlane for MemoryCluster {
    type Session = MemorySession;

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<Pod>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .pods
            .iter()
            .find(|p| p.namespace() == namespace && p.name() == name)
            .cloned())
    }

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .services
            .iter()
            .find(|s| s.metadata.namespace == namespace && s.name() == name)
            .cloned())
    }

    async fn list_pods(
        &self,
        namespace: &str,
        label_selector: &str,
        limit: usize,
    ) -> Result<Vec<Pod>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let selector = parse_label_selector(label_selector);
        Ok(self
            .pods
            .iter()
            .filter(|p| p.namespace() == namespace && p.matches_selector(&selector))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn open_forward(&self, request: ForwardRequest) -> Result<Arc<MemorySession>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MemorySession {
            request,
            stopped: self.stopped.clone(),
        }))
    }
}

pub struct MemorySession {
    request: ForwardRequest,
    stopped: Arc<AtomicUsize>,
}

impl ForwardSession for MemorySession {
    async fn forward_ports(self: Arc<Self>) -> Result<()> {
        self.request.ready.fire();
        self.request.stop.cancelled().await;
        self.stopped.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn ports(&self) -> Result<Vec<ForwardedPort>> {
        Ok(vec![ForwardedPort {
            local: self.request.local_port,
            remote: self.request.remote_port,
        }])
    }
}
