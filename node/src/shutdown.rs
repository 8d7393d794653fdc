//! Graceful shutdown coordination for the link service.
//!
//! A `tokio::sync::watch` flag rather than a broadcast: a signal taken after
//! shutdown was triggered still observes it, which matters for streams the
//! transport dispatches while the service is stopping.

use tokio::signal;
use tokio::sync::watch;

/// Owns the shutdown flag. Dropping the controller counts as shutdown.
pub struct ShutdownController {
    tx: watch::Sender<bool>,
}

/// Cloneable receiving side handed to loops and stream handlers.
#[derive(Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownController {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
        }
    }

    /// Trigger shutdown programmatically.
    pub fn shutdown(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_shutdown(&self) -> bool {
        *self.tx.borrow()
    }

    /// Wait for SIGTERM or SIGINT, then trigger shutdown.
    pub async fn wait_for_signal(&self) {
        let ctrl_c = signal::ctrl_c();

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "failed to install SIGTERM handler");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => { tracing::info!("received SIGINT, shutting down"); }
            _ = terminate => { tracing::info!("received SIGTERM, shutting down"); }
        }

        self.shutdown();
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownSignal {
    pub fn is_shutdown(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once shutdown has been triggered or the controller dropped.
    pub async fn wait(&mut self) {
        while !*self.rx.borrow_and_update() {
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn programmatic_shutdown_notifies_signals() {
        let controller = ShutdownController::new();
        let mut a = controller.signal();
        let mut b = controller.signal();
        controller.shutdown();
        a.wait().await;
        b.wait().await;
        assert!(a.is_shutdown());
    }

    #[tokio::test]
    async fn late_signal_sees_earlier_shutdown() {
        let controller = ShutdownController::new();
        controller.shutdown();
        let mut late = controller.signal();
        assert!(late.is_shutdown());
        late.wait().await;
    }

    #[tokio::test]
    async fn dropped_controller_releases_waiters() {
        let controller = ShutdownController::new();
        let mut signal = controller.signal();
        drop(controller);
        signal.wait().await;
        assert!(!signal.is_shutdown());
    }

    #[tokio::test(start_paused = true)]
    async fn wait_blocks_until_triggered() {
        let controller = ShutdownController::new();
        let mut signal = controller.signal();
        let pending =
            tokio::time::timeout(std::time::Duration::from_secs(1), signal.wait()).await;
        assert!(pending.is_err());
        controller.shutdown();
        signal.wait().await;
    }
}
