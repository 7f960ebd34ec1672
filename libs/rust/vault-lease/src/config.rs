//! Lease manager configuration.
//!
//! `LeaseConfig` is immutable once loaded. `FileConfigProvider` reads the
//! `[vault]` section of an INI file and layers `VAULT_AGENT_VAULT__<KEY>`
//! environment variables on top; a load or validation failure is fatal to
//! the process.

use config::{Config, Environment, File, FileFormat};
use rust_common::{RetryConfig, RetryPolicy};
use secrecy::SecretString;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Default fraction of the lease below which renewal is attempted.
pub const DEFAULT_RENEWAL_THRESHOLD_RATIO: f64 = 0.2;
/// Default secret refresh interval.
pub const DEFAULT_SECRET_INTERVAL: Duration = Duration::from_secs(10);
/// Default lease baseline before the first real lease is known.
pub const DEFAULT_TOKEN_TTL_SECONDS_ASSUMED: i64 = 120;
/// Default lease scheduler tick.
pub const DEFAULT_LEASE_TICK: Duration = Duration::from_secs(5);
/// Default upper bound for one gateway call.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
/// Default KV v2 mount.
pub const DEFAULT_KV_MOUNT_PATH: &str = "kv";

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Missing required field
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    /// Invalid URL format
    #[error("Invalid URL for {field}: {reason}")]
    InvalidUrl {
        /// Offending field
        field: String,
        /// Parser message
        reason: String,
    },

    /// Field present but out of range
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue {
        /// Offending field
        field: String,
        /// Why it was rejected
        reason: String,
    },

    /// File or environment source could not be read
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

impl ConfigError {
    fn invalid(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Lease manager configuration.
#[derive(Debug, Clone)]
pub struct LeaseConfig {
    /// Vault server address
    pub endpoint: Url,
    /// Vault Enterprise namespace, sent as `X-Vault-Namespace`
    pub namespace: Option<String>,
    /// AppRole role identifier
    pub role_id: String,
    /// AppRole secret identifier
    pub secret_id: SecretString,
    /// KV v2 mount path
    pub kv_mount_path: String,
    /// Secret paths refreshed every cycle, in order
    pub secret_paths: Vec<String>,
    /// Fraction of the lease duration at or below which renewal is attempted
    pub renewal_threshold_ratio: f64,
    /// Secret refresh interval
    pub secret_interval: Duration,
    /// Lease baseline used before the first real lease value is known
    pub token_ttl_seconds_assumed: i64,
    /// Lease scheduler tick
    pub lease_tick: Duration,
    /// Upper bound for one gateway call
    pub request_timeout: Duration,
    /// Consecutive gateway failures that open the circuit breaker (0 disables it)
    pub circuit_breaker_threshold: u32,
    /// Backoff after failed cycles, shared by both periodic tasks
    ///
    /// Each task seeds the initial delay from its own interval; see
    /// [`LeaseConfig::backoff_for`].
    pub backoff: Option<RetryConfig>,
}

impl LeaseConfig {
    /// Create a configuration with defaulted optional fields.
    #[must_use]
    pub fn new(
        endpoint: Url,
        role_id: impl Into<String>,
        secret_id: impl Into<String>,
        secret_paths: Vec<String>,
    ) -> Self {
        Self {
            endpoint,
            namespace: None,
            role_id: role_id.into(),
            secret_id: SecretString::from(secret_id.into()),
            kv_mount_path: DEFAULT_KV_MOUNT_PATH.to_string(),
            secret_paths,
            renewal_threshold_ratio: DEFAULT_RENEWAL_THRESHOLD_RATIO,
            secret_interval: DEFAULT_SECRET_INTERVAL,
            token_ttl_seconds_assumed: DEFAULT_TOKEN_TTL_SECONDS_ASSUMED,
            lease_tick: DEFAULT_LEASE_TICK,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            circuit_breaker_threshold: 0,
            backoff: None,
        }
    }

    /// Set the namespace.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Set the KV mount path.
    #[must_use]
    pub fn with_kv_mount_path(mut self, mount: impl Into<String>) -> Self {
        self.kv_mount_path = mount.into();
        self
    }

    /// Set the renewal threshold ratio.
    #[must_use]
    pub const fn with_renewal_threshold_ratio(mut self, ratio: f64) -> Self {
        self.renewal_threshold_ratio = ratio;
        self
    }

    /// Set the secret refresh interval.
    #[must_use]
    pub const fn with_secret_interval(mut self, interval: Duration) -> Self {
        self.secret_interval = interval;
        self
    }

    /// Set the lease scheduler tick.
    #[must_use]
    pub const fn with_lease_tick(mut self, tick: Duration) -> Self {
        self.lease_tick = tick;
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Enable the circuit breaker.
    #[must_use]
    pub const fn with_circuit_breaker_threshold(mut self, threshold: u32) -> Self {
        self.circuit_breaker_threshold = threshold;
        self
    }

    /// Enable backoff of both periodic tasks after failed cycles.
    #[must_use]
    pub fn with_backoff(mut self, backoff: RetryConfig) -> Self {
        self.backoff = Some(backoff);
        self
    }

    /// Backoff policy for a task ticking every `interval`.
    ///
    /// The first delay after a failure equals `interval`; `None` when
    /// backoff is disabled.
    #[must_use]
    pub fn backoff_for(&self, interval: Duration) -> Option<RetryPolicy> {
        self.backoff
            .clone()
            .map(|backoff| RetryPolicy::new(backoff.with_initial_delay(interval)))
    }

    /// Validate field ranges.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.role_id.trim().is_empty() {
            return Err(ConfigError::MissingRequired("role_id".to_string()));
        }
        if secrecy::ExposeSecret::expose_secret(&self.secret_id).trim().is_empty() {
            return Err(ConfigError::MissingRequired("secret_id".to_string()));
        }
        if self.kv_mount_path.trim_matches('/').is_empty() {
            return Err(ConfigError::invalid("kv_mount_path", "must not be empty"));
        }
        if self.secret_paths.is_empty() {
            return Err(ConfigError::invalid("kv_secrets_paths", "at least one path is required"));
        }
        if !(self.renewal_threshold_ratio > 0.0 && self.renewal_threshold_ratio <= 1.0) {
            return Err(ConfigError::invalid(
                "renewal_threshold_ratio",
                format!("{} is outside (0, 1]", self.renewal_threshold_ratio),
            ));
        }
        if self.secret_interval.is_zero() {
            return Err(ConfigError::invalid("secret_interval_seconds", "must be greater than 0"));
        }
        if self.token_ttl_seconds_assumed <= 0 {
            return Err(ConfigError::invalid("token_ttl_seconds_assumed", "must be greater than 0"));
        }
        if self.lease_tick.is_zero() {
            return Err(ConfigError::invalid("lease_tick_seconds", "must be greater than 0"));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::invalid("request_timeout_seconds", "must be greater than 0"));
        }
        Ok(())
    }
}

/// Source of the lease manager configuration.
pub trait ConfigProvider {
    /// Load and validate the configuration.
    ///
    /// # Errors
    ///
    /// Any error is fatal at startup.
    fn load(&self) -> Result<LeaseConfig, ConfigError>;
}

/// Loads configuration from an INI file plus environment overrides.
#[derive(Debug, Clone)]
pub struct FileConfigProvider {
    path: PathBuf,
    env_prefix: String,
    required: bool,
}

impl FileConfigProvider {
    /// Read `path`, which must exist.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            env_prefix: "VAULT_AGENT".to_string(),
            required: true,
        }
    }

    /// Allow the file to be absent so the environment alone can configure the agent.
    #[must_use]
    pub const fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Change the environment variable prefix.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    fn read_raw(&self) -> Result<RawSettings, ConfigError> {
        dotenvy::dotenv().ok();

        let settings = Config::builder()
            .add_source(
                File::new(&self.path.to_string_lossy(), FileFormat::Ini).required(self.required),
            )
            .add_source(
                Environment::with_prefix(&self.env_prefix)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

impl ConfigProvider for FileConfigProvider {
    fn load(&self) -> Result<LeaseConfig, ConfigError> {
        let config = self.read_raw()?.vault.into_config()?;
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawSettings {
    #[serde(default)]
    vault: RawVaultSection,
}

#[derive(Debug, Default, Deserialize)]
struct RawVaultSection {
    addr: Option<String>,
    namespace: Option<String>,
    role_id: Option<String>,
    secret_id: Option<String>,
    kv_mount_path: Option<String>,
    kv_secrets_paths: Option<String>,
    secret_interval_seconds: Option<u64>,
    renewal_threshold_ratio: Option<f64>,
    token_ttl_seconds_assumed: Option<i64>,
    lease_tick_seconds: Option<u64>,
    request_timeout_seconds: Option<u64>,
    circuit_breaker_threshold: Option<u32>,
    backoff_max_delay_seconds: Option<u64>,
}

impl RawVaultSection {
    fn into_config(self) -> Result<LeaseConfig, ConfigError> {
        let addr = required(self.addr, "addr")?;
        let endpoint = Url::parse(&addr).map_err(|e| ConfigError::InvalidUrl {
            field: "addr".to_string(),
            reason: e.to_string(),
        })?;
        let role_id = required(self.role_id, "role_id")?;
        let secret_id = required(self.secret_id, "secret_id")?;

        let mut config = LeaseConfig::new(
            endpoint,
            role_id,
            secret_id,
            parse_paths(self.kv_secrets_paths.as_deref().unwrap_or_default()),
        );

        config.namespace = non_empty(self.namespace);
        if let Some(mount) = non_empty(self.kv_mount_path) {
            config = config.with_kv_mount_path(mount.trim_matches('/'));
        }
        if let Some(ratio) = self.renewal_threshold_ratio {
            config.renewal_threshold_ratio = ratio;
        }
        if let Some(secs) = self.secret_interval_seconds {
            config.secret_interval = Duration::from_secs(secs);
        }
        if let Some(ttl) = self.token_ttl_seconds_assumed {
            config.token_ttl_seconds_assumed = ttl;
        }
        if let Some(secs) = self.lease_tick_seconds {
            config.lease_tick = Duration::from_secs(secs);
        }
        if let Some(secs) = self.request_timeout_seconds {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(threshold) = self.circuit_breaker_threshold {
            config.circuit_breaker_threshold = threshold;
        }
        if let Some(secs) = self.backoff_max_delay_seconds.filter(|s| *s > 0) {
            config = config.with_backoff(RetryConfig::default().with_max_delay(Duration::from_secs(secs)));
        }

        Ok(config)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn required(value: Option<String>, field: &str) -> Result<String, ConfigError> {
    non_empty(value).ok_or_else(|| ConfigError::MissingRequired(field.to_string()))
}

/// Split a comma-separated path list, dropping blanks.
fn parse_paths(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn base_config() -> LeaseConfig {
        LeaseConfig::new(
            Url::parse("http://127.0.0.1:8200").unwrap(),
            "role-1234567890",
            "secret-abcdef",
            vec!["app/db".to_string()],
        )
    }

    fn write_ini(name: &str, body: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("vault-lease-{}-{name}.ini", std::process::id()));
        std::fs::write(&path, body).unwrap();
        path
    }

    fn provider(path: PathBuf) -> FileConfigProvider {
        FileConfigProvider::new(path).with_env_prefix("VAULT_LEASE_CONFIG_TEST_UNSET")
    }

    #[test]
    fn test_defaults() {
        let config = base_config();
        assert!((config.renewal_threshold_ratio - 0.2).abs() < f64::EPSILON);
        assert_eq!(config.secret_interval, Duration::from_secs(10));
        assert_eq!(config.token_ttl_seconds_assumed, 120);
        assert_eq!(config.lease_tick, Duration::from_secs(5));
        assert_eq!(config.kv_mount_path, "kv");
        assert!(config.backoff.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_ratio_bounds() {
        assert!(base_config().with_renewal_threshold_ratio(1.0).validate().is_ok());
        assert!(matches!(
            base_config().with_renewal_threshold_ratio(0.0).validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            base_config().with_renewal_threshold_ratio(1.5).validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(base_config().with_renewal_threshold_ratio(f64::NAN).validate().is_err());
    }

    #[test]
    fn test_empty_paths_rejected() {
        let mut config = base_config();
        config.secret_paths.clear();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let config = base_config().with_secret_interval(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_paths_trims_and_drops_blanks() {
        assert_eq!(parse_paths(" app/db , ,app/api,"), vec!["app/db", "app/api"]);
        assert!(parse_paths("").is_empty());
    }

    #[test]
    fn test_load_from_ini() {
        let path = write_ini(
            "full",
            "[vault]\n\
             addr = http://vault.local:8200\n\
             namespace = team-a\n\
             role_id = role-1234567890\n\
             secret_id = s3cr3t\n\
             kv_mount_path = /kv-v2/\n\
             kv_secrets_paths = app/db, app/api\n\
             secret_interval_seconds = 30\n\
             renewal_threshold_ratio = 0.25\n\
             backoff_max_delay_seconds = 60\n",
        );

        let config = provider(path).load().unwrap();
        assert_eq!(config.endpoint.as_str(), "http://vault.local:8200/");
        assert_eq!(config.namespace.as_deref(), Some("team-a"));
        assert_eq!(config.secret_id.expose_secret(), "s3cr3t");
        assert_eq!(config.kv_mount_path, "kv-v2");
        assert_eq!(config.secret_paths, vec!["app/db", "app/api"]);
        assert_eq!(config.secret_interval, Duration::from_secs(30));
        assert!((config.renewal_threshold_ratio - 0.25).abs() < f64::EPSILON);
        assert_eq!(config.backoff.unwrap().max_delay, Duration::from_secs(60));
    }

    #[test]
    fn test_backoff_seeded_per_task_interval() {
        let config = base_config()
            .with_lease_tick(Duration::from_secs(5))
            .with_secret_interval(Duration::from_secs(30))
            .with_backoff(RetryConfig::default().without_jitter());

        let lease = config.backoff_for(config.lease_tick).unwrap();
        let refresh = config.backoff_for(config.secret_interval).unwrap();
        assert_eq!(lease.delay_for_attempt(0), Duration::from_secs(5));
        assert_eq!(refresh.delay_for_attempt(0), Duration::from_secs(30));
        assert_eq!(refresh.next_delay(config.secret_interval, 2), Duration::from_secs(60));

        assert!(base_config().backoff_for(Duration::from_secs(5)).is_none());
    }

    #[test]
    fn test_missing_required_is_fatal() {
        let path = write_ini(
            "missing",
            "[vault]\naddr = http://vault.local:8200\nrole_id = r\nkv_secrets_paths = a\n",
        );
        let result = provider(path).load();
        assert!(matches!(result, Err(ConfigError::MissingRequired(field)) if field == "secret_id"));
    }

    #[test]
    fn test_invalid_url() {
        let path = write_ini(
            "badurl",
            "[vault]\naddr = not a url\nrole_id = r\nsecret_id = s\nkv_secrets_paths = a\n",
        );
        assert!(matches!(provider(path).load(), Err(ConfigError::InvalidUrl { .. })));
    }

    #[test]
    fn test_missing_file_is_load_error() {
        let path = std::env::temp_dir().join("vault-lease-does-not-exist.ini");
        assert!(matches!(provider(path).load(), Err(ConfigError::Load(_))));
    }

    #[test]
    fn test_optional_missing_file_still_needs_required_fields() {
        let path = std::env::temp_dir().join("vault-lease-optional-does-not-exist.ini");
        let result = provider(path).optional().load();
        assert!(matches!(result, Err(ConfigError::MissingRequired(ref field)) if field == "addr"));
    }
}
