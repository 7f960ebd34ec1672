//! Vault HTTP gateway with request timeouts and an optional circuit breaker.

use crate::{
    config::LeaseConfig,
    error::{VaultError, VaultResult},
    gateway::{AuthGrant, RenewGrant, SecretStoreGateway, TokenLookup, VersionedSecret},
    secrets::{AuthResponse, KvResponse, LookupResponse, stringify_values},
};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use rust_common::{CircuitBreaker, CircuitBreakerConfig, HttpConfig, build_http_client};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};
use url::Url;

const TOKEN_HEADER: &str = "X-Vault-Token";
const NAMESPACE_HEADER: &str = "X-Vault-Namespace";
const USER_AGENT: &str = concat!("vault-lease/", env!("CARGO_PKG_VERSION"));

/// [`SecretStoreGateway`] backed by the Vault HTTP API.
pub struct VaultGateway {
    addr: Url,
    http: Client,
    circuit_breaker: Option<CircuitBreaker>,
}

impl VaultGateway {
    /// Create a gateway for the configured server.
    ///
    /// Every call is bounded by `request_timeout`; the namespace, when set,
    /// is attached to every request.
    ///
    /// # Errors
    ///
    /// Returns `Platform` if the HTTP client cannot be built.
    pub fn new(config: &LeaseConfig) -> VaultResult<Self> {
        let mut http_config = HttpConfig::default()
            .with_timeout(config.request_timeout)
            .with_user_agent(USER_AGENT);
        if let Some(namespace) = &config.namespace {
            http_config = http_config.with_default_header(NAMESPACE_HEADER, namespace);
        }
        let http = build_http_client(&http_config)?;

        let circuit_breaker = (config.circuit_breaker_threshold > 0).then(|| {
            CircuitBreaker::new(
                CircuitBreakerConfig::default()
                    .with_failure_threshold(config.circuit_breaker_threshold)
                    .with_timeout(config.lease_tick.max(config.secret_interval) * 3),
            )
        });

        Ok(Self {
            addr: config.endpoint.clone(),
            http,
            circuit_breaker,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.addr.as_str().trim_end_matches('/'), path)
    }

    /// Send `request` and decode a 2xx JSON body.
    ///
    /// Transport failures become `Transport`/`Timeout`; a non-2xx status or
    /// an undecodable body is passed to `reject` so each operation reports
    /// its own error kind.
    async fn send<T, F>(&self, request: RequestBuilder, reject: F) -> VaultResult<T>
    where
        T: DeserializeOwned,
        F: Fn(String) -> VaultError,
    {
        if let Some(cb) = &self.circuit_breaker {
            if !cb.allow_request() {
                warn!("Circuit breaker open for Vault");
                return Err(VaultError::CircuitBreakerOpen);
            }
        }

        let result = self.do_send(request, reject).await;

        if let Some(cb) = &self.circuit_breaker {
            match &result {
                Err(e) if e.is_retryable() => cb.record_failure(),
                _ => cb.record_success(),
            }
        }

        result.map_err(DoSendError::into_vault)
    }

    async fn do_send<T, F>(&self, request: RequestBuilder, reject: F) -> Result<T, DoSendError>
    where
        T: DeserializeOwned,
        F: Fn(String) -> VaultError,
    {
        let response = request
            .send()
            .await
            .map_err(|e| DoSendError::Vault(VaultError::from(e)))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| DoSendError::Vault(VaultError::from(e)))?;

        if !status.is_success() {
            let text = String::from_utf8_lossy(&body);
            let err = reject(format!("Status {status}: {}", text.trim()));
            return Err(if status.is_server_error() {
                DoSendError::ServerError(err)
            } else {
                DoSendError::Vault(err)
            });
        }

        serde_json::from_slice(&body)
            .map_err(|e| DoSendError::Vault(reject(format!("malformed response: {e}"))))
    }
}

/// Internal split so 5xx responses count against the circuit breaker.
enum DoSendError {
    Vault(VaultError),
    ServerError(VaultError),
}

impl DoSendError {
    const fn is_retryable(&self) -> bool {
        match self {
            Self::Vault(e) => e.is_retryable(),
            Self::ServerError(_) => true,
        }
    }

    fn into_vault(self) -> VaultError {
        match self {
            Self::Vault(e) | Self::ServerError(e) => e,
        }
    }
}

#[async_trait]
impl SecretStoreGateway for VaultGateway {
    #[instrument(skip_all, fields(role_id = %role_id))]
    async fn authenticate(&self, role_id: &str, secret_id: &SecretString) -> VaultResult<AuthGrant> {
        let body = serde_json::json!({
            "role_id": role_id,
            "secret_id": secret_id.expose_secret(),
        });
        let request = self.http.post(self.url("auth/approle/login")).json(&body);

        let response: AuthResponse = self.send(request, VaultError::AuthenticationFailed).await?;
        let auth = response
            .auth
            .ok_or_else(|| VaultError::auth_failed("response has no auth block"))?;
        if auth.client_token.is_empty() {
            return Err(VaultError::auth_failed("response has an empty client_token"));
        }

        debug!(ttl_secs = auth.lease_duration, renewable = auth.renewable, "AppRole login accepted");
        Ok(AuthGrant {
            token: SecretString::from(auth.client_token),
            lease_duration_seconds: auth.lease_duration,
            renewable: auth.renewable,
        })
    }

    #[instrument(skip_all)]
    async fn lookup_self(&self, token: &SecretString) -> VaultResult<TokenLookup> {
        let request = self
            .http
            .get(self.url("auth/token/lookup-self"))
            .header(TOKEN_HEADER, token.expose_secret());

        let response: LookupResponse = self.send(request, VaultError::LookupFailed).await?;
        Ok(TokenLookup {
            remaining_ttl_seconds: response.data.ttl,
            renewable: response.data.renewable,
        })
    }

    #[instrument(skip_all)]
    async fn renew_self(&self, token: &SecretString) -> VaultResult<RenewGrant> {
        let request = self
            .http
            .post(self.url("auth/token/renew-self"))
            .header(TOKEN_HEADER, token.expose_secret())
            .json(&serde_json::json!({}));

        let response: AuthResponse = self.send(request, VaultError::RenewalFailed).await?;
        let auth = response
            .auth
            .ok_or_else(|| VaultError::renew_failed("response has no auth block"))?;

        Ok(RenewGrant {
            lease_duration_seconds: auth.lease_duration,
        })
    }

    #[instrument(skip(self, token))]
    async fn read_secret(
        &self,
        mount_path: &str,
        path: &str,
        token: &SecretString,
    ) -> VaultResult<VersionedSecret> {
        let full_path = format!(
            "{}/data/{}",
            mount_path.trim_matches('/'),
            path.trim_start_matches('/')
        );
        let request = self
            .http
            .get(self.url(&full_path))
            .header(TOKEN_HEADER, token.expose_secret());

        let response: KvResponse = self
            .send(request, |reason| VaultError::secret_read(path, reason))
            .await?;
        let data = response
            .data
            .data
            .ok_or_else(|| VaultError::secret_read(path, "current version has no data"))?;

        Ok(VersionedSecret {
            data: stringify_values(data),
            version: response.data.metadata.and_then(|m| m.version),
        })
    }
}
