//! In-memory control plane used by unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::kubernetes::errors::{KubectlError, Result};
use crate::kubernetes::models::{parse_label_selector, Pod, Service};
use crate::ports::{ControlPlane, ForwardRequest, ForwardSession, ForwardedPort};

/// Local port handed out when a request asks for port 0.
pub const EPHEMERAL_PORT: u16 = 40000;

/// How a fake forwarding session behaves once opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ForwardBehavior {
    /// Ready immediately, runs until stopped.
    #[default]
    Healthy,
    /// Ready after a delay, runs until stopped.
    ReadyAfter(Duration),
    /// The connection upgrade fails.
    RefuseOpen,
    /// The forwarder exits before binding anything.
    ExitBeforeReady,
    /// Ready immediately, then breaks after a delay.
    FaultAfterReady(Duration),
    /// Ready, but bound ports cannot be read.
    BrokenPorts,
}

/// Snapshot of how often each control-plane call was made.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub get_pod: usize,
    pub get_service: usize,
    pub list_pods: usize,
    pub open_forward: usize,
}

impl CallCounts {
    pub fn total(&self) -> usize {
        self.get_pod + self.get_service + self.list_pods + self.open_forward
    }
}

#[derive(Default)]
struct Counters {
    get_pod: AtomicUsize,
    get_service: AtomicUsize,
    list_pods: AtomicUsize,
    open_forward: AtomicUsize,
}

#[derive(Default)]
pub struct FakeCluster {
    pods: Vec<Pod>,
    services: Vec<Service>,
    behaviors: HashMap<String, ForwardBehavior>,
    lookup_delays: HashMap<String, u64>,
    open_delays: HashMap<String, u64>,
    unreachable: bool,
    counters: Counters,
    stopped: Arc<AtomicUsize>,
    last_selector: Mutex<Option<String>>,
    opened: Mutex<Vec<ForwardRequest>>,
}

impl FakeCluster {
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

    pub fn with_behavior(mut self, pod: &str, behavior: ForwardBehavior) -> Self {
        self.behaviors.insert(pod.to_string(), behavior);
        self
    }

    /// Delay lookups of the pod or service called `name`.
    pub fn with_lookup_delay(mut self, name: &str, millis: u64) -> Self {
        self.lookup_delays.insert(name.to_string(), millis);
        self
    }

    /// Delay opening a tunnel to the pod called `pod`.
    pub fn with_open_delay(mut self, pod: &str, millis: u64) -> Self {
        self.open_delays.insert(pod.to_string(), millis);
        self
    }

    /// Every query fails as if the API server were down.
    pub fn with_unreachable_cluster(mut self) -> Self {
        self.unreachable = true;
        self
    }

    pub fn calls(&self) -> CallCounts {
        CallCounts {
            get_pod: self.counters.get_pod.load(Ordering::SeqCst),
            get_service: self.counters.get_service.load(Ordering::SeqCst),
            list_pods: self.counters.list_pods.load(Ordering::SeqCst),
            open_forward: self.counters.open_forward.load(Ordering::SeqCst),
        }
    }

    pub fn last_selector(&self) -> Option<String> {
        self.last_selector.lock().clone()
    }

    pub fn opened_requests(&self) -> Vec<ForwardRequest> {
        self.opened.lock().clone()
    }

    /// Number of sessions that shut down because their stop signal fired.
    pub fn stopped_sessions(&self) -> usize {
        self.stopped.load(Ordering::SeqCst)
    }

    fn check_reachable(&self) -> Result<()> {
        if self.unreachable {
            return Err(KubectlError::from_kubectl_error(
                "dial tcp 127.0.0.1:6443: connect: connection refused",
            ));
        }
        Ok(())
    }

    async fn delay(delays: &HashMap<String, u64>, name: &str) {
        if let Some(millis) = delays.get(name) {
            tokio::time::sleep(Duration::from_millis(*millis)).await;
        }
    }
}

impl ControlPlane for FakeCluster {
    type Session = FakeSession;

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<Pod>> {
        self.counters.get_pod.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()?;
        Self::delay(&self.lookup_delays, name).await;

        Ok(self
            .pods
            .iter()
            .find(|p| p.namespace() == namespace && p.name() == name)
            .cloned())
    }

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>> {
        self.counters.get_service.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()?;
        Self::delay(&self.lookup_delays, name).await;

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
        self.counters.list_pods.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()?;
        *self.last_selector.lock() = Some(label_selector.to_string());

        let selector = parse_label_selector(label_selector);
        Ok(self
            .pods
            .iter()
            .filter(|p| p.namespace() == namespace && p.matches_selector(&selector))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn open_forward(&self, request: ForwardRequest) -> Result<Arc<FakeSession>> {
        self.counters.open_forward.fetch_add(1, Ordering::SeqCst);
        Self::delay(&self.open_delays, &request.pod_name).await;
        self.opened.lock().push(request.clone());

        let behavior = self
            .behaviors
            .get(&request.pod_name)
            .copied()
            .unwrap_or_default();

        if behavior == ForwardBehavior::RefuseOpen {
            return Err(KubectlError::ProcessError(
                "error upgrading connection: unable to upgrade".to_string(),
            ));
        }

        Ok(Arc::new(FakeSession {
            request,
            behavior,
            stopped: self.stopped.clone(),
            ports: Mutex::new(Vec::new()),
        }))
    }
}

pub struct FakeSession {
    request: ForwardRequest,
    behavior: ForwardBehavior,
    stopped: Arc<AtomicUsize>,
    ports: Mutex<Vec<ForwardedPort>>,
}

impl FakeSession {
    fn stopped(&self) -> Result<()> {
        self.stopped.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl ForwardSession for FakeSession {
    async fn forward_ports(self: Arc<Self>) -> Result<()> {
        let stop = self.request.stop.clone();

        match self.behavior {
            ForwardBehavior::ExitBeforeReady => {
                return Err(KubectlError::ProcessError("lost connection to pod".to_string()));
            }
            ForwardBehavior::ReadyAfter(delay) => {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = stop.cancelled() => return self.stopped(),
                }
            }
            _ => {}
        }

        let local = match self.request.local_port {
            0 => EPHEMERAL_PORT,
            port => port,
        };
        *self.ports.lock() = vec![ForwardedPort {
            local,
            remote: self.request.remote_port,
        }];
        self.request.ready.fire();

        if let ForwardBehavior::FaultAfterReady(delay) = self.behavior {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    return Err(KubectlError::ProcessError("connection reset by peer".to_string()));
                }
                _ = stop.cancelled() => {}
            }
        } else {
            stop.cancelled().await;
        }

        self.stopped()
    }

    fn ports(&self) -> Result<Vec<ForwardedPort>> {
        if self.behavior == ForwardBehavior::BrokenPorts {
            return Err(KubectlError::ProcessError("forwarder has no listeners".to_string()));
        }
        let ports = self.ports.lock();
        if ports.is_empty() {
            return Err(KubectlError::PortsNotReady);
        }
        Ok(ports.clone())
    }
}
