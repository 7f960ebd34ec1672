//! Vault error types using thiserror 2.0.
//!
//! One variant per failure kind the lease manager distinguishes. Only
//! configuration errors and the initial authentication are fatal; every
//! other variant is handled inside the scheduler tick that produced it.

use rust_common::PlatformError;
use thiserror::Error;

/// Vault-specific errors.
#[derive(Error, Debug)]
pub enum VaultError {
    /// Network-level failure on a gateway call
    #[error("Vault transport error: {0}")]
    Transport(String),

    /// Gateway call exceeded the request timeout
    #[error("Vault request timed out: {0}")]
    Timeout(String),

    /// Non-success login response or malformed auth payload
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Non-success renew response or malformed renew payload
    #[error("Token renewal failed: {0}")]
    RenewalFailed(String),

    /// Renew attempted on a credential that cannot be renewed
    #[error("Token is not renewable")]
    NotRenewable,

    /// Token lookup failed
    #[error("Token lookup failed: {0}")]
    LookupFailed(String),

    /// Reading one secret path failed
    #[error("Secret read failed for {path}: {reason}")]
    SecretReadFailed {
        /// Secret path relative to the KV mount
        path: String,
        /// Failure detail
        reason: String,
    },

    /// No credential is installed
    #[error("No token available")]
    NotAuthenticated,

    /// Circuit breaker open
    #[error("Circuit breaker open")]
    CircuitBreakerOpen,

    /// Platform error
    #[error(transparent)]
    Platform(#[from] PlatformError),
}

/// Result type for Vault operations.
pub type VaultResult<T> = Result<T, VaultError>;

impl VaultError {
    /// Check if error is a transient upstream condition.
    ///
    /// Retryable gateway failures are the ones counted by the circuit breaker.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout(_) | Self::CircuitBreakerOpen => true,
            Self::Platform(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Create a transport error.
    #[must_use]
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create an authentication failed error.
    #[must_use]
    pub fn auth_failed(msg: impl Into<String>) -> Self {
        Self::AuthenticationFailed(msg.into())
    }

    /// Create a renewal failed error.
    #[must_use]
    pub fn renew_failed(msg: impl Into<String>) -> Self {
        Self::RenewalFailed(msg.into())
    }

    /// Create a lookup failed error.
    #[must_use]
    pub fn lookup_failed(msg: impl Into<String>) -> Self {
        Self::LookupFailed(msg.into())
    }

    /// Create a secret read error scoped to one path.
    #[must_use]
    pub fn secret_read(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SecretReadFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl From<reqwest::Error> for VaultError {
    fn from(err: reqwest::Error) -> Self {
        match PlatformError::from_transport(err) {
            PlatformError::Timeout(msg) => Self::Timeout(msg),
            PlatformError::Unavailable(msg) => Self::Transport(msg),
            other => Self::Transport(other.to_string()),
        }
    }
}
