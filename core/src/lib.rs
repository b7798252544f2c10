//! Perfman Core Library
//!
//! Forwards local ports to pods and services in a Kubernetes cluster.
//! Provides functionality to:
//! - Validate forwarding targets given as `<kind>/<name>` or pod/service names
//! - Resolve every target to one pod and container port, concurrently
//! - Open one tunnel per target and wait for all of them to become ready
//! - Close every tunnel of a batch exactly once, on demand or on interrupt
//!
//! # Architecture
//! This library follows hexagonal architecture (ports & adapters):
//! - `ports`: Trait definitions for the cluster and the forwarding transport
//! - `kubernetes`: kubectl-backed implementation of those traits
//! - `portforward`: Orchestration of a batch of tunnels
//! - `config`: Persisted settings and saved targets

pub mod config;
pub mod error;
pub mod kubernetes;
pub mod portforward;
pub mod ports;

#[cfg(test)]
pub mod testing;

pub use config::{ClusterConfig, Config, ConfigStore};
pub use error::{Error, Result};
pub use kubernetes::{KubectlClient, KubectlError};
pub use portforward::{
    forwarders, ForwardError, Forwarders, PortBindings, ResolvedTarget, TargetOption, TunnelFault,
    TunnelState,
};
pub use ports::{ControlPlane, ForwardSession, ForwardedPort};
