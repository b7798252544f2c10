//! Readiness signalling between a forwarding session and its observers.

use std::sync::Arc;

use tokio::sync::watch;

/// One-time, non-resettable "tunnel is live" notification.
///
/// Clones share the same signal. Any number of tasks may wait on it, before
/// or after it fires.
#[derive(Debug, Clone)]
pub struct ReadySignal {
    tx: Arc<watch::Sender<bool>>,
}

impl ReadySignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Fire the signal. Returns `true` only for the call that fired it.
    pub fn fire(&self) -> bool {
        self.tx.send_if_modified(|fired| {
            if *fired {
                false
            } else {
                *fired = true;
                true
            }
        })
    }

    /// Whether the signal has fired.
    pub fn is_fired(&self) -> bool {
        *self.tx.borrow()
    }

    /// Wait until the signal fires.
    pub async fn fired(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this cannot observe a close.
        let _ = rx.wait_for(|fired| *fired).await;
    }
}

impl Default for ReadySignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready, task};

    #[test]
    fn test_fires_once() {
        let signal = ReadySignal::new();
        assert!(!signal.is_fired());
        assert!(signal.fire());
        assert!(!signal.fire());
        assert!(signal.clone().is_fired());
    }

    #[test]
    fn test_waiters_wake_on_fire() {
        let signal = ReadySignal::new();
        let mut early = task::spawn(signal.fired());
        assert_pending!(early.poll());

        signal.fire();
        assert!(early.is_woken());
        assert_ready!(early.poll());

        let mut late = task::spawn(signal.fired());
        assert_ready!(late.poll());
    }
}
