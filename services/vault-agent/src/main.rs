//! Vault Agent - Main Entry Point
//!
//! Loads `config.ini`, authenticates with AppRole, and keeps the token and
//! the configured KV secrets fresh until SIGINT or SIGTERM.

use std::time::Duration;

use anyhow::Context;
use rust_common::{TracingConfig, init_tracing};
use tracing::{info, warn};
use vault_lease::{ConfigProvider, FileConfigProvider, VaultAgent, wait_for_signal};

const CONFIG_PATH_ENV: &str = "VAULT_AGENT_CONFIG";
const LOG_JSON_ENV: &str = "VAULT_AGENT_LOG_JSON";
const DEFAULT_CONFIG_PATH: &str = "config.ini";
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let json_logs = std::env::var(LOG_JSON_ENV).is_ok_and(|v| v == "1" || v.eq_ignore_ascii_case("true"));
    init_tracing(&TracingConfig::default().with_json_output(json_logs))?;

    let config_path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = FileConfigProvider::new(&config_path)
        .load()
        .with_context(|| format!("failed to load configuration from {config_path}"))?;

    info!(
        endpoint = %config.endpoint,
        paths = config.secret_paths.len(),
        "Starting Vault Agent"
    );

    let running = VaultAgent::new(config)?
        .start()
        .await
        .context("initial authentication failed")?;

    wait_for_signal().await;

    if !running.shutdown(SHUTDOWN_TIMEOUT).await {
        warn!("Background tasks did not stop in time");
    }

    info!("Vault Agent stopped");
    Ok(())
}
