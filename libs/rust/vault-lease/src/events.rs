//! Structured events for the printer/observer.
//!
//! The core reports what happened through [`EventObserver`] and never formats
//! output itself. [`TracingPrinter`] is the default observer and turns each
//! event into a structured `tracing` record.

use std::fmt;
use tracing::{info, warn};

/// Which operation an [`LeaseEvent::OperationFailed`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// AppRole login
    Authenticate,
    /// Token lookup
    Lookup,
    /// Token renewal
    Renew,
    /// KV secret read
    ReadSecret,
}

impl OperationKind {
    /// Stable lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Authenticate => "authenticate",
            Self::Lookup => "lookup",
            Self::Renew => "renew",
            Self::ReadSecret => "read_secret",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why the lease scheduler chose to reauthenticate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReauthReason {
    /// No usable credential is installed
    NoCredential,
    /// Lookup of the current token failed
    LookupFailed,
    /// Remaining TTL reached zero
    Expired,
    /// The token cannot be renewed
    NotRenewable,
    /// Renewal was attempted and failed
    RenewFailed,
}

impl fmt::Display for ReauthReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NoCredential => "no credential",
            Self::LookupFailed => "lookup failed",
            Self::Expired => "token expired",
            Self::NotRenewable => "token not renewable",
            Self::RenewFailed => "renewal failed",
        })
    }
}

/// Event emitted by the lease manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaseEvent {
    /// A new token was obtained
    AuthSucceeded {
        /// Lease length in seconds
        ttl: i64,
        /// Whether the token is renewable
        renewable: bool,
    },
    /// The current token's lease was extended
    RenewSucceeded {
        /// New lease length in seconds
        new_ttl: i64,
    },
    /// The scheduler is about to reauthenticate
    ReauthRequired {
        /// Why
        reason: ReauthReason,
    },
    /// One secret path was refreshed
    SecretRefreshed {
        /// Secret path
        path: String,
        /// Version marker reported by the server
        version: Option<u64>,
    },
    /// A refresh cycle finished
    RefreshCompleted {
        /// Paths refreshed successfully
        refreshed: usize,
        /// Paths that failed
        failed: usize,
    },
    /// An operation failed; the owning task carries on
    OperationFailed {
        /// Failed operation
        kind: OperationKind,
        /// Error detail
        detail: String,
    },
}

/// Receiver of lease manager events.
pub trait EventObserver: Send + Sync {
    /// Handle one event. Must not block.
    fn notify(&self, event: &LeaseEvent);
}

/// Observer that renders events as `tracing` records.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingPrinter;

impl EventObserver for TracingPrinter {
    fn notify(&self, event: &LeaseEvent) {
        match event {
            LeaseEvent::AuthSucceeded { ttl, renewable } => {
                info!(ttl_secs = ttl, renewable, "Authenticated with Vault");
            }
            LeaseEvent::RenewSucceeded { new_ttl } => {
                info!(ttl_secs = new_ttl, "Token lease renewed");
            }
            LeaseEvent::ReauthRequired { reason } => {
                warn!(%reason, "Reauthenticating");
            }
            LeaseEvent::SecretRefreshed { path, version } => match version {
                Some(v) => info!(path = %path, version = v, "Secret refreshed"),
                None => info!(path = %path, "Secret refreshed"),
            },
            LeaseEvent::RefreshCompleted { refreshed, failed } => {
                info!(refreshed, failed, "Secret refresh cycle completed");
            }
            LeaseEvent::OperationFailed { kind, detail } => {
                warn!(operation = %kind, detail = %detail, "Vault operation failed");
            }
        }
    }
}
