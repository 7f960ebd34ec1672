//! Secret-store gateway abstraction.
//!
//! The lease manager consumes exactly four remote operations. Transport and
//! encoding belong to the implementation ([`crate::VaultGateway`] for the
//! Vault HTTP API); the session and schedulers only see these semantic
//! results.

use crate::error::VaultResult;
use async_trait::async_trait;
use secrecy::SecretString;
use std::collections::BTreeMap;

/// Result of a successful AppRole login.
#[derive(Debug, Clone)]
pub struct AuthGrant {
    /// Newly issued token
    pub token: SecretString,
    /// Lease length in seconds as of issuance
    pub lease_duration_seconds: i64,
    /// Whether the token can be renewed in place
    pub renewable: bool,
}

/// Authoritative token state reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenLookup {
    /// Seconds until the token expires
    pub remaining_ttl_seconds: i64,
    /// Whether the token can be renewed in place
    pub renewable: bool,
}

/// Result of a successful token renewal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenewGrant {
    /// New lease length in seconds, counted from now
    pub lease_duration_seconds: i64,
}

/// Current data of one versioned KV secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedSecret {
    /// Key/value pairs of the secret
    pub data: BTreeMap<String, String>,
    /// Version marker, when the engine reports one
    pub version: Option<u64>,
}

/// Remote operations the lease manager depends on.
#[async_trait]
pub trait SecretStoreGateway: Send + Sync {
    /// Obtain a new token from a role/secret identifier pair.
    async fn authenticate(&self, role_id: &str, secret_id: &SecretString) -> VaultResult<AuthGrant>;

    /// Report the remaining TTL and renewability of `token`.
    async fn lookup_self(&self, token: &SecretString) -> VaultResult<TokenLookup>;

    /// Extend the lease of `token` in place.
    async fn renew_self(&self, token: &SecretString) -> VaultResult<RenewGrant>;

    /// Read the current version of the secret at `path` under `mount_path`.
    async fn read_secret(
        &self,
        mount_path: &str,
        path: &str,
        token: &SecretString,
    ) -> VaultResult<VersionedSecret>;
}
