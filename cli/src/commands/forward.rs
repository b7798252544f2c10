//! Forward command - open tunnels and hold them until interrupted.

use std::sync::Arc;

use anyhow::Result;
use perfman_core::{
    forwarders, ConfigStore, ForwardSession, ForwardedPort, Forwarders, KubectlClient,
    KubectlError, ResolvedTarget,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::parse_target;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Binding<'a> {
    target: &'a ResolvedTarget,
    address: &'a str,
    ports: &'a [ForwardedPort],
}

pub async fn run(
    targets: Vec<String>,
    namespace: Option<String>,
    address: Option<String>,
    json: bool,
) -> Result<()> {
    let config = ConfigStore::new()?.load().await?;
    let options = targets
        .iter()
        .map(|t| parse_target(&config, t))
        .collect::<Result<Vec<_>>>()?;

    let mut cluster = config.cluster_config();
    if let Some(namespace) = namespace {
        cluster.default_namespace = namespace;
    }
    if let Some(address) = address {
        cluster.address = address;
    }

    let client = KubectlClient::new(&cluster);
    if !client.is_kubectl_available() {
        return Err(KubectlError::KubectlNotFound.into());
    }
    match client.server_url().await {
        Ok(server) => cluster.server = server,
        Err(e) => tracing::warn!(error = %e, "Could not read API server from kubeconfig"),
    }

    let interrupt = CancellationToken::new();
    spawn_signal_handler(interrupt.clone());

    let handle = forwarders(options, &cluster, Arc::new(client), interrupt.clone()).await?;

    if let Some(mut faults) = handle.take_faults() {
        tokio::spawn(async move {
            while let Some(fault) = faults.recv().await {
                tracing::error!(
                    index = fault.index,
                    tunnel = %fault.target,
                    error = %fault.error,
                    "Forwarding stopped"
                );
            }
        });
    }

    let bindings = tokio::select! {
        result = handle.ready() => result?,
        _ = interrupt.cancelled() => {
            handle.close();
            return Ok(());
        }
    };

    print_bindings(&handle, &cluster.address, &bindings, json)?;

    handle.wait().await;
    Ok(())
}

fn print_bindings<S: ForwardSession>(
    handle: &Forwarders<S>,
    address: &str,
    bindings: &[Vec<ForwardedPort>],
    json: bool,
) -> Result<()> {
    if json {
        let rows: Vec<Binding<'_>> = handle
            .tunnels()
            .iter()
            .zip(bindings)
            .map(|(tunnel, ports)| Binding {
                target: tunnel.target(),
                address,
                ports,
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!("{:<40} {:<22} REMOTE", "POD", "LOCAL");
    println!("{}", "-".repeat(72));

    for (tunnel, ports) in handle.tunnels().iter().zip(bindings) {
        let pod = format!("{}/{}", tunnel.target().namespace(), tunnel.target().pod_name());
        for port in ports {
            println!(
                "{:<40} {:<22} {}",
                pod,
                format!("{}:{}", address, port.local),
                port.remote
            );
        }
    }

    if atty::is(atty::Stream::Stdout) {
        println!("\nForwarding {} targets. Press Ctrl+C to stop.", handle.len());
    }
    Ok(())
}

/// Cancels `interrupt` on Ctrl+C or SIGTERM.
fn spawn_signal_handler(interrupt: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                tracing::info!("Received Ctrl+C, shutting down...");
            }
            _ = terminate => {
                tracing::info!("Received SIGTERM, shutting down...");
            }
        }

        interrupt.cancel();
    });
}
