//! Shutdown signaling for the pipeline.
//!
//! Wraps a tokio watch channel. The pipeline checks the signal between notifications only, so a
//! change event that started processing always runs to completion.

use tokio::sync::watch;

/// Transmitter side of the shutdown channel.
#[derive(Debug, Clone)]
pub struct ShutdownTx(watch::Sender<bool>);

impl ShutdownTx {
    /// Requests shutdown. Requesting it more than once has no further effect.
    pub fn shutdown(&self) {
        self.0.send_replace(true);
    }

    /// Returns a new receiver for this channel.
    pub fn subscribe(&self) -> ShutdownRx {
        ShutdownRx(self.0.subscribe())
    }
}

/// Receiver side of the shutdown channel.
#[derive(Debug, Clone)]
pub struct ShutdownRx(watch::Receiver<bool>);

impl ShutdownRx {
    /// Returns `true` once shutdown was requested.
    pub fn is_shutdown(&self) -> bool {
        *self.0.borrow()
    }

    /// Waits until shutdown is requested.
    ///
    /// Never resolves if every [`ShutdownTx`] was dropped without requesting shutdown.
    pub async fn wait(&mut self) {
        if self.0.wait_for(|shutdown| *shutdown).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Creates a new shutdown channel in the "running" state.
pub fn create_shutdown_channel() -> (ShutdownTx, ShutdownRx) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTx(tx), ShutdownRx(rx))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receivers_observe_shutdown() {
        let (tx, rx) = create_shutdown_channel();
        let late = tx.subscribe();
        assert!(!rx.is_shutdown());

        tx.shutdown();
        tx.shutdown();

        assert!(rx.is_shutdown());
        assert!(late.is_shutdown());
    }

    #[tokio::test]
    async fn wait_returns_once_shutdown_is_requested() {
        let (tx, mut rx) = create_shutdown_channel();

        let waiter = tokio::spawn(async move { rx.wait().await });
        tx.shutdown();

        waiter.await.unwrap();
    }
}
