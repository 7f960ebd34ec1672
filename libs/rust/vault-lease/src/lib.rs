//! Vault token lease manager.
//!
//! Keeps an AppRole token alive (renewing or reauthenticating as its lease
//! runs down) and keeps a local cache of KV secrets fresh. Two periodic
//! tasks share one [`AuthSession`] and one [`SecretCache`]:
//!
//! - [`LeaseScheduler`] resyncs the token on a fixed tick and decides between
//!   renewal and reauthentication
//! - [`SecretCacheRefresher`] re-reads every configured path on its own
//!   interval
//!
//! [`VaultAgent`] wires them together and returns a [`RunningAgent`] handle.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod agent;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod gateway;
pub mod refresher;
pub mod scheduler;
mod secrets;
pub mod session;
pub mod shutdown;

pub use agent::{RunningAgent, VaultAgent};
pub use cache::{CacheSnapshot, SecretCache, SecretRecord};
pub use client::VaultGateway;
pub use config::{ConfigError, ConfigProvider, FileConfigProvider, LeaseConfig};
pub use error::{VaultError, VaultResult};
pub use events::{EventObserver, LeaseEvent, OperationKind, ReauthReason, TracingPrinter};
pub use gateway::{AuthGrant, RenewGrant, SecretStoreGateway, TokenLookup, VersionedSecret};
pub use refresher::{RefreshReport, SecretCacheRefresher};
pub use scheduler::{LeaseAction, LeaseScheduler, TickOutcome, decide};
pub use session::{AuthSession, Credential, SessionState};
pub use shutdown::{ShutdownCoordinator, ShutdownSignal, wait_for_signal};
