//! Lease scheduler: renew or reauthenticate on a fixed tick.
//!
//! Each tick resyncs the session from a token lookup, then applies
//! [`decide`] to the live lease. Every failure is reported and ends the
//! tick; the loop only stops on shutdown.

use crate::{
    config::LeaseConfig,
    events::{EventObserver, LeaseEvent, OperationKind, ReauthReason},
    gateway::SecretStoreGateway,
    session::AuthSession,
    shutdown::ShutdownSignal,
};
use rust_common::RetryPolicy;
use std::{sync::Arc, time::Duration};
use tokio::time::Instant;
use tracing::{debug, info};

/// What a tick should do with the current credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseAction {
    /// Obtain a new token
    Reauthenticate,
    /// Extend the current token, falling back to reauthentication
    Renew,
    /// Nothing to do this tick
    Hold,
}

/// Renewal decision, checked in order.
///
/// An expired or non-renewable credential is replaced; one at or below the
/// threshold (inclusive) is renewed.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn decide(remaining_ttl: i64, renewable: bool, threshold_ttl: f64) -> LeaseAction {
    if remaining_ttl <= 0 || !renewable {
        LeaseAction::Reauthenticate
    } else if remaining_ttl as f64 <= threshold_ttl {
        LeaseAction::Renew
    } else {
        LeaseAction::Hold
    }
}

/// Result of one scheduler tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Lease is healthy
    Held {
        /// Remaining TTL after resync
        remaining_ttl: i64,
    },
    /// Lease renewed in place
    Renewed {
        /// New lease length
        lease_duration_seconds: i64,
    },
    /// A new token was obtained
    Reauthenticated {
        /// Why reauthentication was needed
        reason: ReauthReason,
    },
    /// Reauthentication was needed and failed
    ReauthFailed {
        /// Why reauthentication was needed
        reason: ReauthReason,
    },
}

impl TickOutcome {
    /// Whether the tick ended without a usable credential.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::ReauthFailed { .. })
    }
}

/// Periodic renew-vs-reauthenticate task.
pub struct LeaseScheduler {
    session: Arc<AuthSession>,
    gateway: Arc<dyn SecretStoreGateway>,
    observer: Arc<dyn EventObserver>,
    ratio: f64,
    interval: Duration,
    backoff: Option<RetryPolicy>,
}

impl LeaseScheduler {
    /// Create a scheduler over `session`.
    #[must_use]
    pub fn new(
        config: &LeaseConfig,
        session: Arc<AuthSession>,
        gateway: Arc<dyn SecretStoreGateway>,
        observer: Arc<dyn EventObserver>,
    ) -> Self {
        Self {
            session,
            gateway,
            observer,
            ratio: config.renewal_threshold_ratio,
            interval: config.lease_tick,
            backoff: config.backoff_for(config.lease_tick),
        }
    }

    /// Run one resync-and-decide cycle.
    pub async fn tick(&self) -> TickOutcome {
        let Some(credential) = self.session.active() else {
            return self.reauthenticate(ReauthReason::NoCredential).await;
        };

        let lookup = match self.gateway.lookup_self(&credential.token).await {
            Ok(lookup) => lookup,
            Err(e) => {
                self.observer.notify(&LeaseEvent::OperationFailed {
                    kind: OperationKind::Lookup,
                    detail: e.to_string(),
                });
                return self.reauthenticate(ReauthReason::LookupFailed).await;
            }
        };

        let now = Instant::now();
        let credential = self
            .session
            .resync(&credential.token, lookup, now)
            .unwrap_or(credential);

        let remaining = credential.remaining_ttl(now);
        let threshold = credential.threshold_ttl(self.ratio);
        debug!(
            ttl_secs = remaining,
            threshold_secs = threshold,
            renewable = credential.renewable,
            "Lease checked"
        );

        match decide(remaining, credential.renewable, threshold) {
            LeaseAction::Hold => TickOutcome::Held { remaining_ttl: remaining },
            LeaseAction::Renew => match self.session.renew().await {
                Ok(renewed) => TickOutcome::Renewed {
                    lease_duration_seconds: renewed.lease_duration_seconds,
                },
                Err(_) => self.reauthenticate(ReauthReason::RenewFailed).await,
            },
            LeaseAction::Reauthenticate => {
                let reason = if remaining <= 0 {
                    ReauthReason::Expired
                } else {
                    ReauthReason::NotRenewable
                };
                self.reauthenticate(reason).await
            }
        }
    }

    async fn reauthenticate(&self, reason: ReauthReason) -> TickOutcome {
        self.session.mark_expired();
        self.observer.notify(&LeaseEvent::ReauthRequired { reason });
        match self.session.authenticate().await {
            Ok(_) => TickOutcome::Reauthenticated { reason },
            Err(_) => TickOutcome::ReauthFailed { reason },
        }
    }

    /// Tick until `shutdown` fires.
    ///
    /// The first tick runs one interval after start. With backoff configured,
    /// consecutive failed ticks stretch the sleep.
    pub async fn run(self, mut shutdown: ShutdownSignal) {
        info!(
            tick_secs = self.interval.as_secs(),
            ratio = self.ratio,
            "Lease scheduler started"
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

            failures = if self.tick().await.is_failure() {
                failures.saturating_add(1)
            } else {
                0
            };
        }

        info!("Lease scheduler stopped");
    }
}
