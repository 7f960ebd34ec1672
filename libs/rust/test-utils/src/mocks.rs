//! Mock implementations for testing.
//!
//! [`MockGateway`] answers each operation from a per-operation script and
//! falls back to a configurable default once the script runs out.
//! [`RecordingObserver`] keeps every event it receives.

use async_trait::async_trait;
use parking_lot::Mutex;
use secrecy::{ExposeSecret, SecretString};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use vault_lease::{
    AuthGrant, EventObserver, LeaseEvent, OperationKind, RenewGrant, SecretStoreGateway,
    TokenLookup, VaultError, VaultResult, VersionedSecret,
};

#[derive(Default)]
struct Script {
    auth: VecDeque<VaultResult<AuthGrant>>,
    lookup: VecDeque<VaultResult<TokenLookup>>,
    renew: VecDeque<VaultResult<RenewGrant>>,
    reads: HashMap<String, VecDeque<VaultResult<VersionedSecret>>>,
    secrets: HashMap<String, VersionedSecret>,
    renewed_tokens: Vec<String>,
    read_counts: HashMap<String, usize>,
}

/// Scripted in-memory [`SecretStoreGateway`].
///
/// Defaults: login issues `s.token-<n>` with the configured lease, lookup
/// reports the full lease, renew grants the full lease, and reads return the
/// stored secret or a 404-style error.
pub struct MockGateway {
    lease_seconds: i64,
    renewable: bool,
    issued: AtomicUsize,
    auth_calls: AtomicUsize,
    lookup_calls: AtomicUsize,
    renew_calls: AtomicUsize,
    script: Mutex<Script>,
}

impl MockGateway {
    /// Gateway issuing renewable 120 second tokens.
    #[must_use]
    pub fn new() -> Self {
        Self::with_lease(120, true)
    }

    /// Gateway issuing tokens with the given default lease.
    #[must_use]
    pub fn with_lease(lease_seconds: i64, renewable: bool) -> Self {
        Self {
            lease_seconds,
            renewable,
            issued: AtomicUsize::new(0),
            auth_calls: AtomicUsize::new(0),
            lookup_calls: AtomicUsize::new(0),
            renew_calls: AtomicUsize::new(0),
            script: Mutex::new(Script::default()),
        }
    }

    /// Queue the next login result.
    pub fn push_auth(&self, result: VaultResult<AuthGrant>) {
        self.script.lock().auth.push_back(result);
    }

    /// Queue a failing login.
    pub fn fail_auth(&self, reason: &str) {
        self.push_auth(Err(VaultError::auth_failed(reason)));
    }

    /// Queue the next lookup result.
    pub fn push_lookup(&self, result: VaultResult<TokenLookup>) {
        self.script.lock().lookup.push_back(result);
    }

    /// Queue a successful lookup.
    pub fn push_lookup_ttl(&self, remaining_ttl_seconds: i64, renewable: bool) {
        self.push_lookup(Ok(TokenLookup {
            remaining_ttl_seconds,
            renewable,
        }));
    }

    /// Queue a failing lookup.
    pub fn fail_lookup(&self, reason: &str) {
        self.push_lookup(Err(VaultError::lookup_failed(reason)));
    }

    /// Queue the next renew result.
    pub fn push_renew(&self, result: VaultResult<RenewGrant>) {
        self.script.lock().renew.push_back(result);
    }

    /// Queue a failing renew.
    pub fn fail_renew(&self, reason: &str) {
        self.push_renew(Err(VaultError::renew_failed(reason)));
    }

    /// Store the secret returned for `path` when no read is queued.
    pub fn set_secret(&self, path: &str, data: &[(&str, &str)], version: Option<u64>) {
        let secret = VersionedSecret {
            data: data
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect::<BTreeMap<_, _>>(),
            version,
        };
        self.script.lock().secrets.insert(path.to_string(), secret);
    }

    /// Queue the next read result for `path`.
    pub fn push_read(&self, path: &str, result: VaultResult<VersionedSecret>) {
        self.script
            .lock()
            .reads
            .entry(path.to_string())
            .or_default()
            .push_back(result);
    }

    /// Queue a failing read for `path`.
    pub fn fail_read(&self, path: &str, reason: &str) {
        self.push_read(path, Err(VaultError::secret_read(path, reason)));
    }

    /// Number of login calls.
    #[must_use]
    pub fn auth_calls(&self) -> usize {
        self.auth_calls.load(Ordering::SeqCst)
    }

    /// Number of lookup calls.
    #[must_use]
    pub fn lookup_calls(&self) -> usize {
        self.lookup_calls.load(Ordering::SeqCst)
    }

    /// Number of renew calls.
    #[must_use]
    pub fn renew_calls(&self) -> usize {
        self.renew_calls.load(Ordering::SeqCst)
    }

    /// Number of read calls for `path`.
    #[must_use]
    pub fn read_calls(&self, path: &str) -> usize {
        self.script.lock().read_counts.get(path).copied().unwrap_or(0)
    }

    /// Tokens presented to renew, in call order.
    #[must_use]
    pub fn renewed_tokens(&self) -> Vec<String> {
        self.script.lock().renewed_tokens.clone()
    }

    fn issue_token(&self) -> SecretString {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        SecretString::from(format!("s.token-{n}"))
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SecretStoreGateway for MockGateway {
    async fn authenticate(&self, _role_id: &str, _secret_id: &SecretString) -> VaultResult<AuthGrant> {
        self.auth_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.script.lock().auth.pop_front();
        scripted.unwrap_or_else(|| {
            Ok(AuthGrant {
                token: self.issue_token(),
                lease_duration_seconds: self.lease_seconds,
                renewable: self.renewable,
            })
        })
    }

    async fn lookup_self(&self, _token: &SecretString) -> VaultResult<TokenLookup> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.script.lock().lookup.pop_front();
        scripted.unwrap_or(Ok(TokenLookup {
            remaining_ttl_seconds: self.lease_seconds,
            renewable: self.renewable,
        }))
    }

    async fn renew_self(&self, token: &SecretString) -> VaultResult<RenewGrant> {
        self.renew_calls.fetch_add(1, Ordering::SeqCst);
        let mut script = self.script.lock();
        script.renewed_tokens.push(token.expose_secret().to_string());
        script.renew.pop_front().unwrap_or(Ok(RenewGrant {
            lease_duration_seconds: self.lease_seconds,
        }))
    }

    async fn read_secret(
        &self,
        _mount_path: &str,
        path: &str,
        _token: &SecretString,
    ) -> VaultResult<VersionedSecret> {
        let mut script = self.script.lock();
        *script.read_counts.entry(path.to_string()).or_default() += 1;
        if let Some(result) = script.reads.get_mut(path).and_then(VecDeque::pop_front) {
            return result;
        }
        script
            .secrets
            .get(path)
            .cloned()
            .ok_or_else(|| VaultError::secret_read(path, "Status 404 Not Found"))
    }
}

/// Observer that keeps every event.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<LeaseEvent>>,
}

impl RecordingObserver {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All events so far.
    #[must_use]
    pub fn events(&self) -> Vec<LeaseEvent> {
        self.events.lock().clone()
    }

    /// Number of events matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&LeaseEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| predicate(e)).count()
    }

    /// Number of failures of the given operation.
    #[must_use]
    pub fn failures(&self, kind: OperationKind) -> usize {
        self.count(|e| matches!(e, LeaseEvent::OperationFailed { kind: k, .. } if *k == kind))
    }
}

impl EventObserver for RecordingObserver {
    fn notify(&self, event: &LeaseEvent) {
        self.events.lock().push(event.clone());
    }
}
