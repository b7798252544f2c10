//! A `kubectl port-forward` child process driven as a forwarding session.

use std::collections::VecDeque;
use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use parking_lot::Mutex;
use regex::Regex;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};

use crate::ports::{ForwardRequest, ForwardSession, ForwardedPort};

use super::errors::{KubectlError, Result};

/// Grace period before force-killing a process.
const KILL_GRACE_PERIOD: Duration = Duration::from_millis(300);

/// Stderr lines kept for error reports.
const STDERR_TAIL_LINES: usize = 20;

fn forwarding_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // "Forwarding from 127.0.0.1:9090 -> 8080" or "Forwarding from [::1]:9090 -> 8080"
    RE.get_or_init(|| Regex::new(r"^Forwarding from (.+):(\d+) -> (\d+)").unwrap())
}

/// Parses a kubectl status line announcing a bound local port.
pub fn parse_forwarding_line(line: &str) -> Option<ForwardedPort> {
    let caps = forwarding_line().captures(line.trim())?;
    Some(ForwardedPort {
        local: caps[2].parse().ok()?,
        remote: caps[3].parse().ok()?,
    })
}

/// Tunnel to one pod through a `kubectl port-forward` child.
///
/// The child is started by [`KubectlForwardSession::spawn`] and driven by
/// [`ForwardSession::forward_ports`], which reads its status lines until the
/// stop signal fires or the child exits.
pub struct KubectlForwardSession {
    request: ForwardRequest,
    child: Mutex<Option<Child>>,
    ports: Mutex<Vec<ForwardedPort>>,
}

impl KubectlForwardSession {
    /// Starts `kubectl port-forward` for `request`.
    pub fn spawn(
        kubectl_path: &Path,
        base_args: Vec<OsString>,
        request: ForwardRequest,
    ) -> Result<Self> {
        let args = port_forward_args(&request);
        tracing::debug!(kubectl = %kubectl_path.display(), args = ?args, "Starting port-forward");

        let child = Command::new(kubectl_path)
            .args(base_args)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| KubectlError::ProcessError(format!("Failed to start kubectl: {}", e)))?;

        Ok(Self {
            request,
            child: Mutex::new(Some(child)),
            ports: Mutex::new(Vec::new()),
        })
    }

    /// Records a bound port; the first one makes the tunnel ready.
    fn record_line(&self, line: &str) {
        match parse_forwarding_line(line) {
            Some(port) => {
                tracing::debug!(
                    pod = %self.request.pod_name,
                    local = port.local,
                    remote = port.remote,
                    "Port bound"
                );
                {
                    let mut ports = self.ports.lock();
                    if !ports.contains(&port) {
                        ports.push(port);
                    }
                }
                self.request.ready.fire();
            }
            None => tracing::trace!(pod = %self.request.pod_name, line, "kubectl output"),
        }
    }
}

impl ForwardSession for KubectlForwardSession {
    async fn forward_ports(self: Arc<Self>) -> Result<()> {
        let mut child = self
            .child
            .lock()
            .take()
            .ok_or_else(|| KubectlError::ProcessError("port-forward already running".to_string()))?;

        let stderr_tail = Arc::new(Mutex::new(VecDeque::with_capacity(STDERR_TAIL_LINES)));
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(collect_tail(stderr, stderr_tail.clone()));
        }

        let stdout = child.stdout.take().ok_or_else(|| {
            KubectlError::ProcessError("port-forward stdout not captured".to_string())
        })?;
        let mut lines = BufReader::new(stdout).lines();
        let stop = self.request.stop.clone();

        loop {
            tokio::select! {
                _ = stop.cancelled() => {
                    terminate(&mut child).await;
                    return Ok(());
                }
                line = lines.next_line() => match line {
                    Ok(Some(line)) => self.record_line(&line),
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!(
                            pod = %self.request.pod_name,
                            error = %e,
                            "Failed to read port-forward output"
                        );
                        break;
                    }
                },
            }
        }

        let status = tokio::select! {
            _ = stop.cancelled() => {
                terminate(&mut child).await;
                return Ok(());
            }
            status = child.wait() => status?,
        };

        let tail: Vec<String> = stderr_tail.lock().iter().cloned().collect();
        Err(KubectlError::ProcessError(format!(
            "kubectl port-forward exited ({}): {}",
            status,
            tail.join("; ")
        )))
    }

    fn ports(&self) -> Result<Vec<ForwardedPort>> {
        let ports = self.ports.lock();
        if ports.is_empty() {
            return Err(KubectlError::PortsNotReady);
        }
        Ok(ports.clone())
    }
}

fn port_forward_args(request: &ForwardRequest) -> Vec<String> {
    vec![
        "port-forward".to_string(),
        "-n".to_string(),
        request.namespace.clone(),
        format!("pod/{}", request.pod_name),
        request.port_mapping(),
        format!("--address={}", request.address),
    ]
}

/// Keeps the last lines of `reader` in `tail`.
async fn collect_tail<R: AsyncRead + Unpin>(reader: R, tail: Arc<Mutex<VecDeque<String>>>) {
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        tracing::debug!(line = %line, "kubectl stderr");
        let mut buffer = tail.lock();
        if buffer.len() == STDERR_TAIL_LINES {
            buffer.pop_front();
        }
        buffer.push_back(line);
    }
}

/// SIGTERM, then SIGKILL if the child outlives the grace period.
async fn terminate(child: &mut Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        if kill(Pid::from_raw(pid as i32), Signal::SIGTERM).is_ok()
            && tokio::time::timeout(KILL_GRACE_PERIOD, child.wait()).await.is_ok()
        {
            return;
        }
    }

    let _ = child.kill().await;
}
