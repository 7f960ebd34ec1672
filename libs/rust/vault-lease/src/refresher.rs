//! Periodic secret refresh into the [`SecretCache`].

use crate::{
    cache::{SecretCache, SecretRecord},
    config::LeaseConfig,
    error::VaultError,
    events::{EventObserver, LeaseEvent, OperationKind},
    gateway::SecretStoreGateway,
    session::AuthSession,
    shutdown::ShutdownSignal,
};
use rust_common::RetryPolicy;
use std::{sync::Arc, time::Duration};
use tracing::{info, instrument};

/// Outcome of one refresh cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshReport {
    /// Paths whose cache entry was replaced
    pub refreshed: usize,
    /// Paths whose read failed
    pub failed: usize,
}

impl RefreshReport {
    /// Whether nothing could be refreshed.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        self.refreshed == 0
    }
}

/// Periodic task re-reading every configured path.
pub struct SecretCacheRefresher {
    session: Arc<AuthSession>,
    cache: Arc<SecretCache>,
    gateway: Arc<dyn SecretStoreGateway>,
    observer: Arc<dyn EventObserver>,
    mount_path: String,
    paths: Vec<String>,
    interval: Duration,
    backoff: Option<RetryPolicy>,
}

impl SecretCacheRefresher {
    /// Create a refresher for the configured paths.
    #[must_use]
    pub fn new(
        config: &LeaseConfig,
        session: Arc<AuthSession>,
        cache: Arc<SecretCache>,
        gateway: Arc<dyn SecretStoreGateway>,
        observer: Arc<dyn EventObserver>,
    ) -> Self {
        Self {
            session,
            cache,
            gateway,
            observer,
            mount_path: config.kv_mount_path.clone(),
            paths: config.secret_paths.clone(),
            interval: config.secret_interval,
            backoff: config.backoff_for(config.secret_interval),
        }
    }

    /// Read every path once with the current token.
    ///
    /// Paths are independent: a failed read is reported and leaves that
    /// path's previous entry in place. Without a token nothing is read and
    /// the skipped cycle is reported as a failed read.
    #[instrument(skip(self), fields(paths = self.paths.len()))]
    pub async fn refresh_all(&self) -> RefreshReport {
        let Some(token) = self.session.token() else {
            self.observer.notify(&LeaseEvent::OperationFailed {
                kind: OperationKind::ReadSecret,
                detail: VaultError::NotAuthenticated.to_string(),
            });
            return RefreshReport::default();
        };

        let mut report = RefreshReport::default();
        for path in &self.paths {
            match self.gateway.read_secret(&self.mount_path, path, &token).await {
                Ok(secret) => {
                    let record = SecretRecord::from_read(path.as_str(), secret);
                    let version = record.version;
                    self.cache.replace(record);
                    report.refreshed += 1;
                    self.observer.notify(&LeaseEvent::SecretRefreshed {
                        path: path.clone(),
                        version,
                    });
                }
                Err(e) => {
                    report.failed += 1;
                    self.observer.notify(&LeaseEvent::OperationFailed {
                        kind: OperationKind::ReadSecret,
                        detail: e.to_string(),
                    });
                }
            }
        }

        self.observer.notify(&LeaseEvent::RefreshCompleted {
            refreshed: report.refreshed,
            failed: report.failed,
        });
        report
    }

    /// Refresh until `shutdown` fires.
    ///
    /// With backoff configured, cycles that refresh nothing stretch the sleep.
    pub async fn run(self, mut shutdown: ShutdownSignal) {
        info!(
            interval_secs = self.interval.as_secs(),
            paths = self.paths.len(),
            "Secret refresher started"
        );

        let mut failures: u32 = 0;
        loop {
            let delay = self
                .backoff
                .as_ref()
                .map_or(self.interval, |policy| policy.next_delay(self.interval, failures));

            tokio::select! {
                () = shutdown.recv() => break,
                () = tokio::time::sleep(delay) => {}
            }

            failures = if self.refresh_all().await.is_failure() {
                failures.saturating_add(1)
            } else {
                0
            };
        }

        info!("Secret refresher stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_failure_only_when_nothing_refreshed() {
        assert!(RefreshReport::default().is_failure());
        assert!(RefreshReport { refreshed: 0, failed: 2 }.is_failure());
        assert!(!RefreshReport { refreshed: 1, failed: 1 }.is_failure());
    }
}
