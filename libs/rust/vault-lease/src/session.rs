//! Authenticated session state.
//!
//! [`AuthSession`] owns the current [`Credential`]. The lock is held only to
//! copy state in or out; gateway calls always run on a snapshot, so a slow
//! request in one task never blocks the other task's access to the token.

use crate::{
    config::LeaseConfig,
    error::{VaultError, VaultResult},
    events::{EventObserver, LeaseEvent, OperationKind},
    gateway::{SecretStoreGateway, TokenLookup},
};
use parking_lot::Mutex;
use secrecy::{ExposeSecret, SecretString};
use std::{sync::Arc, time::Duration};
use tokio::time::Instant;
use tracing::{debug, warn};

/// A token together with its lease.
#[derive(Debug, Clone)]
pub struct Credential {
    /// Opaque token; redacted in `Debug`
    pub token: SecretString,
    /// Lease length in seconds as of `issued_at`
    pub lease_duration_seconds: i64,
    /// When the lease started
    pub issued_at: Instant,
    /// Whether the token can be renewed in place
    pub renewable: bool,
}

impl Credential {
    /// Create a credential issued at `issued_at`.
    #[must_use]
    pub const fn new(
        token: SecretString,
        lease_duration_seconds: i64,
        issued_at: Instant,
        renewable: bool,
    ) -> Self {
        Self {
            token,
            lease_duration_seconds,
            issued_at,
            renewable,
        }
    }

    /// `max(0, lease_duration_seconds - (now - issued_at))`, in whole seconds.
    #[must_use]
    pub fn remaining_ttl(&self, now: Instant) -> i64 {
        remaining_ttl(self.lease_duration_seconds, now.saturating_duration_since(self.issued_at))
    }

    /// Renewal threshold derived from this credential's live lease.
    #[must_use]
    pub fn threshold_ttl(&self, ratio: f64) -> f64 {
        threshold_ttl(self.lease_duration_seconds, ratio)
    }

    fn same_token(&self, token: &SecretString) -> bool {
        self.token.expose_secret() == token.expose_secret()
    }
}

/// Remaining lease after `elapsed` has passed, floored at zero.
#[must_use]
pub fn remaining_ttl(lease_duration_seconds: i64, elapsed: Duration) -> i64 {
    let elapsed = i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX);
    lease_duration_seconds.saturating_sub(elapsed).max(0)
}

/// `ratio × lease_duration_seconds`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn threshold_ttl(lease_duration_seconds: i64, ratio: f64) -> f64 {
    lease_duration_seconds as f64 * ratio
}

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No credential has been obtained yet
    Unauthenticated,
    /// A credential with remaining lease is installed
    Authenticated,
    /// The credential ran out or was given up on
    Expired,
}

#[derive(Debug, Default)]
struct SessionInner {
    credential: Option<Credential>,
    expired: bool,
}

/// Owner of the current credential.
pub struct AuthSession {
    gateway: Arc<dyn SecretStoreGateway>,
    observer: Arc<dyn EventObserver>,
    role_id: String,
    secret_id: SecretString,
    assumed_lease_seconds: i64,
    inner: Mutex<SessionInner>,
}

impl AuthSession {
    /// Create an unauthenticated session.
    #[must_use]
    pub fn new(
        config: &LeaseConfig,
        gateway: Arc<dyn SecretStoreGateway>,
        observer: Arc<dyn EventObserver>,
    ) -> Self {
        Self {
            gateway,
            observer,
            role_id: config.role_id.clone(),
            secret_id: config.secret_id.clone(),
            assumed_lease_seconds: config.token_ttl_seconds_assumed,
            inner: Mutex::new(SessionInner::default()),
        }
    }

    /// Log in and install a fresh credential issued now.
    ///
    /// # Errors
    ///
    /// Returns the gateway error; the installed credential is left untouched.
    pub async fn authenticate(&self) -> VaultResult<Credential> {
        let grant = match self.gateway.authenticate(&self.role_id, &self.secret_id).await {
            Ok(grant) => grant,
            Err(e) => {
                self.report(OperationKind::Authenticate, &e);
                return Err(e);
            }
        };

        let lease = if grant.lease_duration_seconds > 0 {
            grant.lease_duration_seconds
        } else {
            warn!(
                assumed_ttl_secs = self.assumed_lease_seconds,
                "Login returned no lease duration, using assumed TTL"
            );
            self.assumed_lease_seconds
        };

        let credential = Credential::new(grant.token, lease, Instant::now(), grant.renewable);
        {
            let mut inner = self.inner.lock();
            inner.credential = Some(credential.clone());
            inner.expired = false;
        }

        self.observer.notify(&LeaseEvent::AuthSucceeded {
            ttl: credential.lease_duration_seconds,
            renewable: credential.renewable,
        });
        Ok(credential)
    }

    /// Extend the current token's lease in place.
    ///
    /// # Errors
    ///
    /// `NotAuthenticated` without a credential, `NotRenewable` when the
    /// credential cannot be renewed, otherwise the gateway error. State is
    /// unchanged on error.
    pub async fn renew(&self) -> VaultResult<Credential> {
        let current = self.snapshot().ok_or(VaultError::NotAuthenticated)?;
        if !current.renewable {
            self.report(OperationKind::Renew, &VaultError::NotRenewable);
            return Err(VaultError::NotRenewable);
        }

        let grant = match self.gateway.renew_self(&current.token).await {
            Ok(grant) => grant,
            Err(e) => {
                self.report(OperationKind::Renew, &e);
                return Err(e);
            }
        };

        let renewed = {
            let mut guard = self.inner.lock();
            let inner = &mut *guard;
            match inner.credential.as_mut() {
                Some(credential) if credential.same_token(&current.token) => {
                    credential.lease_duration_seconds = grant.lease_duration_seconds;
                    credential.issued_at = Instant::now();
                    inner.expired = false;
                    Some(credential.clone())
                }
                _ => None,
            }
        };

        let Some(renewed) = renewed else {
            let err = VaultError::renew_failed("credential replaced during renewal");
            self.report(OperationKind::Renew, &err);
            return Err(err);
        };

        self.observer.notify(&LeaseEvent::RenewSucceeded {
            new_ttl: renewed.lease_duration_seconds,
        });
        Ok(renewed)
    }

    /// Immutable copy of the current credential.
    #[must_use]
    pub fn snapshot(&self) -> Option<Credential> {
        self.inner.lock().credential.clone()
    }

    /// Current token, if one is installed and non-empty.
    #[must_use]
    pub fn token(&self) -> Option<SecretString> {
        self.inner
            .lock()
            .credential
            .as_ref()
            .filter(|c| !c.token.expose_secret().is_empty())
            .map(|c| c.token.clone())
    }

    /// Lifecycle state at `now`.
    #[must_use]
    pub fn state(&self, now: Instant) -> SessionState {
        let inner = self.inner.lock();
        match &inner.credential {
            None => SessionState::Unauthenticated,
            Some(_) if inner.expired => SessionState::Expired,
            Some(c) if c.remaining_ttl(now) == 0 => SessionState::Expired,
            Some(_) => SessionState::Authenticated,
        }
    }

    /// Lease length the threshold is computed from.
    ///
    /// Falls back to the assumed TTL only while no credential exists.
    #[must_use]
    pub fn lease_duration_seconds(&self) -> i64 {
        self.inner
            .lock()
            .credential
            .as_ref()
            .map_or(self.assumed_lease_seconds, |c| c.lease_duration_seconds)
    }

    /// Apply an authoritative lookup taken with `token` at `now`.
    ///
    /// Stores the renewable flag and rebases `issued_at` so the remaining TTL
    /// equals the looked-up value, bounded by the lease. Returns the updated
    /// credential, or `None` if the token was replaced in the meantime.
    pub fn resync(&self, token: &SecretString, lookup: TokenLookup, now: Instant) -> Option<Credential> {
        let mut inner = self.inner.lock();
        let credential = inner.credential.as_mut().filter(|c| c.same_token(token))?;

        let remaining = lookup.remaining_ttl_seconds.clamp(0, credential.lease_duration_seconds.max(0));
        let consumed = u64::try_from(credential.lease_duration_seconds - remaining).unwrap_or(0);
        credential.issued_at = now.checked_sub(Duration::from_secs(consumed)).unwrap_or(now);
        credential.renewable = lookup.renewable;

        debug!(ttl_secs = remaining, renewable = lookup.renewable, "Lease resynced from lookup");
        Some(credential.clone())
    }

    /// Mark the current credential as given up on.
    pub fn mark_expired(&self) {
        let mut inner = self.inner.lock();
        if inner.credential.is_some() {
            inner.expired = true;
        }
    }

    /// Current credential unless it has been marked expired.
    #[must_use]
    pub fn active(&self) -> Option<Credential> {
        let inner = self.inner.lock();
        if inner.expired {
            return None;
        }
        inner.credential.clone()
    }

    fn report(&self, kind: OperationKind, err: &VaultError) {
        self.observer.notify(&LeaseEvent::OperationFailed {
            kind,
            detail: err.to_string(),
        });
    }
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("role_id", &self.role_id)
            .field("credential", &self.inner.lock().credential)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        events::TracingPrinter,
        gateway::{AuthGrant, RenewGrant, VersionedSecret},
    };
    use async_trait::async_trait;
    use url::Url;

    /// Gateway that always grants the same renewable lease.
    struct FixedLease(i64);

    #[async_trait]
    impl SecretStoreGateway for FixedLease {
        async fn authenticate(&self, _role_id: &str, _secret_id: &SecretString) -> VaultResult<AuthGrant> {
            Ok(AuthGrant {
                token: SecretString::from("s.fixed"),
                lease_duration_seconds: self.0,
                renewable: true,
            })
        }

        async fn lookup_self(&self, _token: &SecretString) -> VaultResult<TokenLookup> {
            Ok(TokenLookup {
                remaining_ttl_seconds: self.0,
                renewable: true,
            })
        }

        async fn renew_self(&self, _token: &SecretString) -> VaultResult<RenewGrant> {
            Ok(RenewGrant {
                lease_duration_seconds: self.0,
            })
        }

        async fn read_secret(
            &self,
            _mount_path: &str,
            path: &str,
            _token: &SecretString,
        ) -> VaultResult<VersionedSecret> {
            Err(VaultError::secret_read(path, "Status 404"))
        }
    }

    fn session(lease: i64) -> AuthSession {
        let config = LeaseConfig::new(
            Url::parse("http://127.0.0.1:8200").unwrap(),
            "role-id",
            "secret-id",
            vec!["app/db".to_string()],
        );
        AuthSession::new(&config, Arc::new(FixedLease(lease)), Arc::new(TracingPrinter))
    }

    fn credential(lease: i64, issued_at: Instant) -> Credential {
        Credential::new(SecretString::from("s.token"), lease, issued_at, true)
    }

    #[test]
    fn test_remaining_ttl_floors_at_zero() {
        assert_eq!(remaining_ttl(120, Duration::from_secs(0)), 120);
        assert_eq!(remaining_ttl(120, Duration::from_secs(96)), 24);
        assert_eq!(remaining_ttl(120, Duration::from_secs(500)), 0);
        assert_eq!(remaining_ttl(120, Duration::from_secs(u64::MAX)), 0);
    }

    #[test]
    fn test_threshold_uses_live_lease() {
        assert!((threshold_ttl(120, 0.2) - 24.0).abs() < f64::EPSILON);
        assert!((threshold_ttl(3600, 0.2) - 720.0).abs() < f64::EPSILON);
    }

    #[tokio::test(start_paused = true)]
    async fn test_credential_counts_down() {
        let start = Instant::now();
        let cred = credential(60, start);
        assert_eq!(cred.remaining_ttl(start), 60);

        tokio::time::advance(Duration::from_secs(45)).await;
        assert_eq!(cred.remaining_ttl(Instant::now()), 15);

        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(cred.remaining_ttl(Instant::now()), 0);
    }

    #[test]
    fn test_debug_redacts_token() {
        let cred = credential(60, Instant::now());
        assert!(!format!("{cred:?}").contains("s.token"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_lease_exhaustion_expires_session() {
        let session = session(60);
        session.authenticate().await.unwrap();
        assert_eq!(session.state(Instant::now()), SessionState::Authenticated);

        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(session.state(Instant::now()), SessionState::Authenticated);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(session.state(Instant::now()), SessionState::Expired);
        assert!(session.active().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_renew_after_exhaustion_restores_authenticated() {
        let session = session(60);
        session.authenticate().await.unwrap();

        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(session.state(Instant::now()), SessionState::Expired);

        session.renew().await.unwrap();
        assert_eq!(session.state(Instant::now()), SessionState::Authenticated);
    }
}
