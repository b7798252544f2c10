//! Coordinates resolution and establishment of a batch of tunnels and
//! hands back a single lifecycle handle for all of them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::ClusterConfig;
use crate::ports::{ControlPlane, ForwardSession, ForwardedPort};

use super::error::Result;
use super::group::TaskGroup;
use super::locator::resolve_all;
use super::options::{normalize_options, TargetOption};
use super::tunnel::{establish, Tunnel, TunnelEndpoint, TunnelFault, TunnelSignals, TunnelState};

/// Local ports bound by one tunnel.
pub type PortBindings = Vec<ForwardedPort>;

/// Release state shared between a [`Forwarders`] handle and its supervisor.
struct Release {
    id: Uuid,
    released: AtomicBool,
    stops: Vec<CancellationToken>,
    closed: CancellationToken,
}

impl Release {
    /// Stop every tunnel. Only the first call does anything.
    fn release(&self) -> bool {
        if self
            .released
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        tracing::info!(id = %self.id, tunnels = self.stops.len(), "Closing port forwarding");
        for stop in &self.stops {
            stop.cancel();
        }
        self.closed.cancel();
        true
    }
}

/// Handle over every tunnel started by one [`forwarders`] call.
///
/// Tunnels keep the order of the options they were created from. Dropping
/// the handle closes it.
pub struct Forwarders<S> {
    tunnels: Vec<Tunnel<S>>,
    release: Arc<Release>,
    interrupt: CancellationToken,
    faults: Mutex<Option<mpsc::UnboundedReceiver<TunnelFault>>>,
}

impl<S: ForwardSession> Forwarders<S> {
    /// Identifier of this batch, as it appears in logs.
    pub fn id(&self) -> Uuid {
        self.release.id
    }

    pub fn tunnels(&self) -> &[Tunnel<S>] {
        &self.tunnels
    }

    pub fn len(&self) -> usize {
        self.tunnels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tunnels.is_empty()
    }

    /// Current state of every tunnel, in option order.
    pub fn states(&self) -> Vec<TunnelState> {
        self.tunnels.iter().map(|t| t.state()).collect()
    }

    /// Wait for every tunnel to become ready, in option order, and return
    /// the ports each one bound.
    ///
    /// A slow tunnel delays the result even if later ones are already live.
    pub async fn ready(&self) -> Result<Vec<PortBindings>> {
        let mut bindings = Vec::with_capacity(self.tunnels.len());
        for tunnel in &self.tunnels {
            tunnel.wait_ready().await?;
            bindings.push(tunnel.ports()?);
        }
        Ok(bindings)
    }

    /// Stop every tunnel.
    ///
    /// Safe to call any number of times from any number of threads; only the
    /// first call releases anything. Returns whether this call did.
    pub fn close(&self) -> bool {
        self.release.release()
    }

    pub fn is_closed(&self) -> bool {
        self.release.closed.is_cancelled()
    }

    /// Block until the interrupt token fires (or the handle is closed some
    /// other way), then close.
    pub async fn wait(&self) {
        tokio::select! {
            _ = self.interrupt.cancelled() => {
                tracing::info!(id = %self.release.id, "Terminating connection...");
            }
            _ = self.release.closed.cancelled() => {}
        }
        self.close();
    }

    /// Take the stream of faults reported by tunnels after establishment.
    ///
    /// Returns `None` once taken. A fault closes only the tunnel that raised it.
    pub fn take_faults(&self) -> Option<mpsc::UnboundedReceiver<TunnelFault>> {
        self.faults.lock().take()
    }
}

impl<S> Drop for Forwarders<S> {
    fn drop(&mut self) {
        self.release.release();
    }
}

/// Resolve `options` against the cluster, open one tunnel per option and
/// return a handle over all of them.
///
/// Validation fails before any cluster call. Resolution and establishment
/// each run every option concurrently and return the first error after all
/// have finished; tunnels already started by a failed call are stopped.
/// When `interrupt` fires the handle closes itself.
pub async fn forwarders<C: ControlPlane>(
    options: Vec<TargetOption>,
    cluster: &ClusterConfig,
    client: Arc<C>,
    interrupt: CancellationToken,
) -> Result<Forwarders<C::Session>> {
    let normalized = normalize_options(options, &cluster.default_namespace)?;
    let targets = resolve_all(client.clone(), normalized).await?;

    let id = Uuid::new_v4();
    let endpoint = Arc::new(TunnelEndpoint {
        server: cluster.server.clone(),
        address: cluster.address.clone(),
    });
    let (fault_tx, fault_rx) = mpsc::unbounded_channel();
    let signals: Vec<TunnelSignals> = targets.iter().map(|_| TunnelSignals::new()).collect();

    let mut group = TaskGroup::new();
    let pairs = targets.into_iter().zip(signals.iter().cloned());
    for (index, (target, tunnel_signals)) in pairs.enumerate() {
        let client = client.clone();
        let endpoint = endpoint.clone();
        let faults = fault_tx.clone();
        group.spawn(async move {
            establish(client.as_ref(), index, target, tunnel_signals, &endpoint, faults).await
        });
    }

    let tunnels = match group.wait().await {
        Ok(tunnels) => tunnels,
        Err(e) => {
            tracing::warn!(id = %id, error = %e, "Tunnel setup failed, stopping started tunnels");
            for s in &signals {
                s.stop.cancel();
            }
            return Err(e);
        }
    };

    tracing::info!(id = %id, tunnels = tunnels.len(), "Port forwarding started");

    let release = Arc::new(Release {
        id,
        released: AtomicBool::new(false),
        stops: signals.into_iter().map(|s| s.stop).collect(),
        closed: CancellationToken::new(),
    });

    let supervisor = release.clone();
    let token = interrupt.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {
                supervisor.release();
            }
            _ = supervisor.closed.cancelled() => {}
        }
    });

    Ok(Forwarders {
        tunnels,
        release,
        interrupt,
        faults: Mutex::new(Some(fault_rx)),
    })
}
