//! One forwarding tunnel: establishment, lifecycle state and fault reporting.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::ports::{portforward_path, ControlPlane, ForwardRequest, ForwardSession, ForwardedPort};

use super::error::{ForwardError, Result};
use super::locator::ResolvedTarget;
use super::signal::ReadySignal;

/// Lifecycle of a tunnel. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TunnelState {
    Created,
    Establishing,
    Ready,
    Closed,
}

impl TunnelState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Establishing => "establishing",
            Self::Ready => "ready",
            Self::Closed => "closed",
        }
    }
}

/// A fault reported by a tunnel after it was established.
#[derive(Debug)]
pub struct TunnelFault {
    /// Position of the tunnel among the caller's options.
    pub index: usize,
    pub target: ResolvedTarget,
    pub error: ForwardError,
}

/// Stop and readiness signals plus the state of one tunnel.
///
/// Created by the coordinator before establishment so that a failed setup
/// can still stop every tunnel it started.
#[derive(Debug, Clone)]
pub struct TunnelSignals {
    pub stop: CancellationToken,
    pub ready: ReadySignal,
    state: Arc<watch::Sender<TunnelState>>,
}

impl TunnelSignals {
    pub fn new() -> Self {
        let (state, _rx) = watch::channel(TunnelState::Created);
        Self {
            stop: CancellationToken::new(),
            ready: ReadySignal::new(),
            state: Arc::new(state),
        }
    }

    pub fn state(&self) -> TunnelState {
        *self.state.borrow()
    }

    /// Move to `next` if it is ahead of the current state.
    fn advance(&self, next: TunnelState) -> bool {
        self.state.send_if_modified(|current| {
            if next > *current {
                *current = next;
                true
            } else {
                false
            }
        })
    }

    /// Wait until the tunnel reaches `Closed`.
    pub async fn closed(&self) {
        let mut rx = self.state.subscribe();
        let _ = rx.wait_for(|s| *s == TunnelState::Closed).await;
    }
}

impl Default for TunnelSignals {
    fn default() -> Self {
        Self::new()
    }
}

/// Where tunnels connect from and to.
#[derive(Debug, Clone)]
pub struct TunnelEndpoint {
    /// API server URL the portforward subresource hangs off.
    pub server: String,
    /// Local bind address.
    pub address: String,
}

/// A live tunnel to one resolved target.
pub struct Tunnel<S> {
    index: usize,
    target: ResolvedTarget,
    signals: TunnelSignals,
    session: Arc<S>,
}

impl<S: ForwardSession> Tunnel<S> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn target(&self) -> &ResolvedTarget {
        &self.target
    }

    pub fn state(&self) -> TunnelState {
        self.signals.state()
    }

    pub fn is_ready(&self) -> bool {
        self.signals.ready.is_fired()
    }

    /// Fire the stop signal. Idempotent.
    pub fn stop(&self) {
        self.signals.stop.cancel();
    }

    /// Wait for the readiness signal.
    ///
    /// Fails with `NotReady` if the tunnel closes without ever becoming ready.
    pub async fn wait_ready(&self) -> Result<()> {
        tokio::select! {
            biased;
            _ = self.signals.ready.fired() => Ok(()),
            _ = self.signals.closed() => {
                if self.signals.ready.is_fired() {
                    Ok(())
                } else {
                    Err(ForwardError::NotReady {
                        target: self.target.to_string(),
                    })
                }
            }
        }
    }

    /// Local ports currently bound by this tunnel.
    pub fn ports(&self) -> Result<Vec<ForwardedPort>> {
        self.session.ports().map_err(|source| ForwardError::Ports {
            target: self.target.to_string(),
            source,
        })
    }

    /// Wait until the forwarding task has finished.
    pub async fn closed(&self) {
        self.signals.closed().await
    }
}

/// Opens a tunnel to `target` and starts its forwarding loop in the background.
///
/// Returns once the transport has built the forwarder; the local port may
/// not be accepting connections yet. Faults after that point go to `faults`
/// and close only this tunnel.
pub async fn establish<C: ControlPlane>(
    client: &C,
    index: usize,
    target: ResolvedTarget,
    signals: TunnelSignals,
    endpoint: &TunnelEndpoint,
    faults: mpsc::UnboundedSender<TunnelFault>,
) -> Result<Tunnel<C::Session>> {
    signals.advance(TunnelState::Establishing);

    let request = ForwardRequest {
        namespace: target.namespace().to_string(),
        pod_name: target.pod_name().to_string(),
        local_port: target.local_port(),
        remote_port: target.remote_port(),
        address: endpoint.address.clone(),
        url: portforward_path(&endpoint.server, target.namespace(), target.pod_name()),
        stop: signals.stop.clone(),
        ready: signals.ready.clone(),
    };

    tracing::debug!(tunnel = %target, url = %request.url, "Opening tunnel");

    let session = match client.open_forward(request).await {
        Ok(session) => session,
        Err(source) => {
            signals.advance(TunnelState::Closed);
            return Err(ForwardError::Establishment {
                target: target.to_string(),
                source,
            });
        }
    };

    tokio::spawn(run_forwarding(
        index,
        target.clone(),
        signals.clone(),
        session.clone(),
        faults,
    ));

    Ok(Tunnel {
        index,
        target,
        signals,
        session,
    })
}

async fn run_forwarding<S: ForwardSession>(
    index: usize,
    target: ResolvedTarget,
    signals: TunnelSignals,
    session: Arc<S>,
    faults: mpsc::UnboundedSender<TunnelFault>,
) {
    let forwarding = session.forward_ports();
    tokio::pin!(forwarding);

    let result = tokio::select! {
        result = &mut forwarding => result,
        _ = signals.ready.fired() => {
            if signals.advance(TunnelState::Ready) {
                tracing::info!(tunnel = %target, "Tunnel ready");
            }
            forwarding.await
        }
    };

    signals.advance(TunnelState::Closed);

    match result {
        Ok(()) => tracing::info!(tunnel = %target, "Tunnel closed"),
        Err(source) => {
            tracing::error!(tunnel = %target, error = %source, "Tunnel failed");
            // The receiver may already be gone if the caller dropped it.
            let _ = faults.send(TunnelFault {
                index,
                error: ForwardError::ForwardingFault {
                    target: target.to_string(),
                    source,
                },
                target,
            });
        }
    }
}
