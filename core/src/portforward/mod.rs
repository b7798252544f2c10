//! Concurrent port forwarding to pods.
//!
//! Takes a batch of [`TargetOption`]s, resolves each to one pod and
//! container port, opens a tunnel per target in parallel and returns a
//! [`Forwarders`] handle that waits for readiness and closes everything at
//! once.
//!
//! ```ignore
//! let handle = forwarders(options, &cluster, client, interrupt).await?;
//! let bindings = handle.ready().await?;
//! handle.wait().await;
//! ```

pub mod error;
pub mod forwarder;
pub mod group;
pub mod locator;
pub mod options;
pub mod signal;
pub mod tunnel;

pub use error::{ForwardError, Result};
pub use forwarder::{forwarders, Forwarders, PortBindings};
pub use locator::{locate, resolve_all, ResolvedTarget};
pub use options::{normalize_options, parse_source, NormalizedOption, TargetKind, TargetOption};
pub use signal::ReadySignal;
pub use tunnel::{establish, Tunnel, TunnelEndpoint, TunnelFault, TunnelSignals, TunnelState};
