// Per-worker stop signal (cooperative cancellation)

use tokio::sync::watch;

/// Worker side: polled at loop boundaries, awaited while idle
pub struct StopToken {
    rx: watch::Receiver<bool>,
}

impl StopToken {
    /// Check if a stop was requested
    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait for a stop request
    ///
    /// Also resolves if the controller side is dropped, since the worker's
    /// registry entry is gone at that point.
    pub async fn wait(&mut self) {
        let _ = self.rx.wait_for(|stopped| *stopped).await;
    }
}

/// Controller side, kept in the worker registry
pub struct StopHandle {
    tx: watch::Sender<bool>,
}

impl StopHandle {
    /// Ask the worker to exit after its current item
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }
}

/// Create a linked stop handle and token
pub fn stop_channel() -> (StopHandle, StopToken) {
    let (tx, rx) = watch::channel(false);
    (StopHandle { tx }, StopToken { rx })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_stop_is_observed() {
        let (handle, mut token) = stop_channel();
        assert!(!token.is_stopped());

        handle.stop();
        assert!(token.is_stopped());
        tokio::time::timeout(Duration::from_secs(1), token.wait())
            .await
            .expect("wait should resolve after stop");
    }

    #[tokio::test]
    async fn test_wait_blocks_until_stop() {
        let (handle, mut token) = stop_channel();

        let waiter = tokio::spawn(async move {
            token.wait().await;
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        handle.stop();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake")
            .unwrap();
    }
}
