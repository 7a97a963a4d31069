//! Stop signal for a mirror's background loop.
//!
//! One [`StopHandle`] per mirror, held by whoever owns the process
//! lifecycle. The loop holds the matching [`StopSignal`] and observes it at
//! every suspension point: while waiting on the watch stream, the resync
//! timer, a relist, or a reconnect backoff.

use tokio::sync::watch;

/// Create a connected stop handle and signal.
pub fn stop_channel() -> (StopHandle, StopSignal) {
    let (tx, rx) = watch::channel(false);
    (StopHandle { tx }, StopSignal { rx })
}

/// Owner side: requests shutdown.
///
/// Dropping the handle also counts as a stop request.
#[derive(Debug)]
pub struct StopHandle {
    tx: watch::Sender<bool>,
}

impl StopHandle {
    /// Request shutdown. Calling it more than once has no further effect.
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }

    /// Another signal observing this handle.
    pub fn signal(&self) -> StopSignal {
        StopSignal {
            rx: self.tx.subscribe(),
        }
    }
}

/// Loop side: resolves once shutdown was requested.
#[derive(Debug, Clone)]
pub struct StopSignal {
    rx: watch::Receiver<bool>,
}

impl StopSignal {
    /// Whether shutdown has been requested.
    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Wait until shutdown is requested. Cancel safe.
    pub async fn stopped(&mut self) {
        // Err means the handle is gone, which is a stop as well
        let _ = self.rx.wait_for(|stopped| *stopped).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_stop_wakes_waiter() {
        let (handle, mut signal) = stop_channel();
        assert!(!signal.is_stopped());

        let waiter = tokio::spawn(async move { signal.stopped().await });
        handle.stop();
        handle.stop();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should finish")
            .unwrap();
    }

    #[tokio::test]
    async fn test_dropped_handle_counts_as_stop() {
        let (handle, mut signal) = stop_channel();
        let other = handle.signal();
        drop(handle);

        assert!(other.is_stopped());
        tokio::time::timeout(Duration::from_secs(1), signal.stopped())
            .await
            .expect("dropping the handle should stop");
    }
}
