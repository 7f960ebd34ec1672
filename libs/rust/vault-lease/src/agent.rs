//! Top-level orchestrator.
//!
//! [`VaultAgent`] builds the session and cache, performs the initial login
//! and secret load, then hands both periodic tasks to a
//! [`ShutdownCoordinator`]. All shared state is owned here and passed to the
//! tasks by `Arc`.

use crate::{
    cache::SecretCache,
    client::VaultGateway,
    config::LeaseConfig,
    error::VaultResult,
    events::{EventObserver, TracingPrinter},
    gateway::SecretStoreGateway,
    refresher::SecretCacheRefresher,
    scheduler::LeaseScheduler,
    session::AuthSession,
    shutdown::ShutdownCoordinator,
};
use std::{sync::Arc, time::Duration};
use tracing::{info, instrument};

/// Startup wiring for the lease manager.
pub struct VaultAgent {
    config: LeaseConfig,
    gateway: Arc<dyn SecretStoreGateway>,
    observer: Arc<dyn EventObserver>,
}

impl VaultAgent {
    /// Agent talking to Vault over HTTP, reporting through [`TracingPrinter`].
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: LeaseConfig) -> VaultResult<Self> {
        let gateway = Arc::new(VaultGateway::new(&config)?);
        Ok(Self::with_gateway(config, gateway))
    }

    /// Agent using a caller-supplied gateway.
    #[must_use]
    pub fn with_gateway(config: LeaseConfig, gateway: Arc<dyn SecretStoreGateway>) -> Self {
        Self {
            config,
            gateway,
            observer: Arc::new(TracingPrinter),
        }
    }

    /// Replace the event observer.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn EventObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Authenticate, load every secret once and start both periodic tasks.
    ///
    /// # Errors
    ///
    /// Returns the initial authentication error. Failed secret reads during
    /// the initial load are reported but not fatal.
    #[instrument(skip(self), fields(endpoint = %self.config.endpoint))]
    pub async fn start(self) -> VaultResult<RunningAgent> {
        let session = Arc::new(AuthSession::new(
            &self.config,
            Arc::clone(&self.gateway),
            Arc::clone(&self.observer),
        ));
        let cache = Arc::new(SecretCache::new());

        session.authenticate().await?;

        let refresher = SecretCacheRefresher::new(
            &self.config,
            Arc::clone(&session),
            Arc::clone(&cache),
            Arc::clone(&self.gateway),
            Arc::clone(&self.observer),
        );
        let initial = refresher.refresh_all().await;
        info!(
            refreshed = initial.refreshed,
            failed = initial.failed,
            "Initial secret load finished"
        );

        let scheduler = LeaseScheduler::new(
            &self.config,
            Arc::clone(&session),
            Arc::clone(&self.gateway),
            Arc::clone(&self.observer),
        );

        let mut coordinator = ShutdownCoordinator::new();
        let lease_signal = coordinator.subscribe();
        let refresh_signal = coordinator.subscribe();
        coordinator.spawn("lease-scheduler", scheduler.run(lease_signal));
        coordinator.spawn("secret-refresher", refresher.run(refresh_signal));

        Ok(RunningAgent {
            session,
            cache,
            coordinator,
        })
    }
}

/// Handle to a started agent.
pub struct RunningAgent {
    session: Arc<AuthSession>,
    cache: Arc<SecretCache>,
    coordinator: ShutdownCoordinator,
}

impl RunningAgent {
    /// Shared session, for reading the current token.
    #[must_use]
    pub fn session(&self) -> Arc<AuthSession> {
        Arc::clone(&self.session)
    }

    /// Shared secret cache.
    #[must_use]
    pub fn cache(&self) -> Arc<SecretCache> {
        Arc::clone(&self.cache)
    }

    /// Stop both tasks, waiting up to `timeout`.
    ///
    /// Returns whether both stopped before the timeout.
    pub async fn shutdown(self, timeout: Duration) -> bool {
        self.coordinator.shutdown(timeout).await
    }
}
