//! Ports layer - Trait definitions (interfaces).
//!
//! This module defines the interfaces the forwarding core uses to talk to
//! the cluster. The kubectl-backed implementation lives in `kubernetes`.

mod cluster;
mod transport;

pub use cluster::ControlPlane;
pub use transport::{portforward_path, ForwardRequest, ForwardSession, ForwardedPort};
