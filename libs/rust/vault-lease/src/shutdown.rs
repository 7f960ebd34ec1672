//! Graceful shutdown for the periodic tasks.
//!
//! Tasks are tracked in a `JoinSet`. Each task holds a [`ShutdownSignal`] and
//! races its inter-tick sleep against it, so shutdown takes effect at the
//! next suspension point instead of mid-request.

use std::{future::Future, time::Duration};
use tokio::{signal, sync::watch, task::JoinSet};
use tracing::{error, info, warn};

/// Owner of the shutdown channel and the spawned tasks.
#[derive(Debug)]
pub struct ShutdownCoordinator {
    shutdown_tx: watch::Sender<bool>,
    tasks: JoinSet<()>,
}

impl ShutdownCoordinator {
    /// Creates a new shutdown coordinator
    #[must_use]
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            shutdown_tx,
            tasks: JoinSet::new(),
        }
    }

    /// Gets a shutdown receiver
    #[must_use]
    pub fn subscribe(&self) -> ShutdownSignal {
        ShutdownSignal {
            receiver: Some(self.shutdown_tx.subscribe()),
        }
    }

    /// Spawns a tracked task; the future is expected to watch its own signal.
    pub fn spawn<F>(&mut self, name: &'static str, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tasks.spawn(async move {
            future.await;
            info!(task = name, "Background task stopped");
        });
    }

    /// Signals every task without waiting.
    pub fn trigger(&self) {
        self.shutdown_tx.send_replace(true);
    }

    /// Signals shutdown and waits up to `timeout` for the tasks to stop.
    ///
    /// Tasks still running after the timeout are aborted. Returns whether all
    /// tasks stopped on their own.
    pub async fn shutdown(mut self, timeout: Duration) -> bool {
        info!("Initiating graceful shutdown");
        self.trigger();

        let drained = tokio::time::timeout(timeout, async {
            while let Some(result) = self.tasks.join_next().await {
                if let Err(e) = result {
                    warn!(error = %e, "Task failed during shutdown");
                }
            }
        })
        .await;

        if drained.is_err() {
            warn!("Shutdown timeout reached, aborting remaining tasks");
            self.tasks.abort_all();
            return false;
        }

        info!("Shutdown complete");
        true
    }

    /// Returns the number of active tasks
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Shutdown signal receiver
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    receiver: Option<watch::Receiver<bool>>,
}

impl ShutdownSignal {
    /// Signal that never fires, for driving a loop without a coordinator.
    #[must_use]
    pub const fn never() -> Self {
        Self { receiver: None }
    }

    /// Waits for shutdown; returns immediately once it has been signalled.
    ///
    /// A dropped coordinator counts as shutdown.
    pub async fn recv(&mut self) {
        match &mut self.receiver {
            Some(receiver) => {
                let _ = receiver.wait_for(|stop| *stop).await;
            }
            None => std::future::pending().await,
        }
    }

    /// Checks if shutdown has been signaled (non-blocking)
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.receiver.as_ref().is_some_and(|r| *r.borrow())
    }
}

/// Waits for SIGTERM or SIGINT
pub async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            info!("Received SIGTERM, initiating shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_signal_reaches_late_subscriber() {
        let coordinator = ShutdownCoordinator::new();
        coordinator.trigger();

        let mut signal = coordinator.subscribe();
        assert!(signal.is_shutdown());
        tokio::time::timeout(Duration::from_secs(1), signal.recv())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_waits_for_tasks() {
        let mut coordinator = ShutdownCoordinator::new();
        let mut signal = coordinator.subscribe();
        coordinator.spawn("waiter", async move { signal.recv().await });
        assert_eq!(coordinator.task_count(), 1);

        assert!(coordinator.shutdown(Duration::from_secs(1)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_aborts_stuck_tasks() {
        let mut coordinator = ShutdownCoordinator::new();
        coordinator.spawn("stuck", std::future::pending());

        assert!(!coordinator.shutdown(Duration::from_millis(50)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_signal_stays_pending() {
        let mut signal = ShutdownSignal::never();
        assert!(!signal.is_shutdown());
        assert!(
            tokio::time::timeout(Duration::from_secs(60), signal.recv())
                .await
                .is_err()
        );
    }
}
