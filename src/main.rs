//! lapi-gate - Decision enforcement agent.
//!
//! Usage: `lapi-gate [config.toml]`

use anyhow::Context;
use lapi_gate::config::{self, Config};
use lapi_gate::decision::Scope;
use lapi_gate::gate::{EnforcementGate, RemediationPolicy};
use lapi_gate::http::{self, AppState};
use lapi_gate::resolver::{CachedResolver, OriginResolver, TableResolver};
use lapi_gate::store::{self, DecisionStore};
use lapi_gate::sync::{Backoff, LapiClient, SyncClient};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| config::DEFAULT_CONFIG_PATH.to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    if let Err(errors) = config::validate(&config) {
        for e in &errors {
            error!(code = e.error_code(), "{}", e);
        }
        anyhow::bail!("{} configuration error(s) in {}", errors.len(), config_path);
    }

    info!(
        lapi = %config.lapi.url,
        listen = %config.http.listen,
        country = config.country_remediations.enabled,
        asn = config.as_remediations.enabled,
        "Starting lapi-gate"
    );

    lapi_gate::metrics::init();

    // Origin resolver for the geo scopes
    let mut table = TableResolver::new();
    if config.country_remediations.enabled
        && let Some(path) = &config.country_remediations.database_path
    {
        table.load_countries(path)?;
    }
    if config.as_remediations.enabled
        && let Some(path) = &config.as_remediations.database_path
    {
        table.load_asns(path)?;
    }
    let resolver: Arc<dyn OriginResolver> = Arc::new(CachedResolver::new(
        table,
        Duration::from_secs(config.resolver.cache_ttl_secs),
        config.resolver.cache_max_size,
    ));

    let cancel = CancellationToken::new();
    let store = Arc::new(DecisionStore::new());

    // Sync loop
    let mut scopes = vec![Scope::Ip, Scope::Range];
    if config.as_remediations.enabled {
        scopes.push(Scope::As);
    }
    if config.country_remediations.enabled {
        scopes.push(Scope::Country);
    }
    let lapi = LapiClient::new(&config.lapi, &scopes)?;
    let sync = SyncClient::new(
        lapi,
        Arc::clone(&store),
        config.lapi.poll_interval(),
        Backoff::new(config.lapi.initial_backoff(), config.lapi.max_backoff()),
    );
    let sync_state = sync.state();
    let sync_handle = sync.spawn(cancel.clone());

    let sweep_handle = store::spawn_sweep_task(
        Arc::clone(&store),
        Duration::from_secs(config.store.sweep_interval_secs),
        cancel.clone(),
    );

    // Request path
    let gate = Arc::new(EnforcementGate::new(Arc::clone(&store)).with_geo_scopes(
        resolver,
        config.country_remediations.enabled,
        config.as_remediations.enabled,
    ));
    let ban_page = http::load_ban_page(&config.ban).context("failed to read ban template")?;
    let state = Arc::new(AppState::new(
        gate,
        RemediationPolicy::from_config(&config),
        sync_state,
        &config.http.trusted_forward_header,
        ban_page,
    )?);

    let listener = tokio::net::TcpListener::bind(config.http.listen)
        .await
        .with_context(|| format!("failed to bind {}", config.http.listen))?;
    let http_handle = tokio::spawn(http::run_http_server(listener, state, cancel.clone()));

    // Shutdown on Ctrl-C
    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");
    cancel.cancel();

    let (sync_result, sweep_result, http_result) =
        tokio::join!(sync_handle, sweep_handle, http_handle);
    sync_result?;
    sweep_result?;
    http_result??;

    info!("lapi-gate stopped");
    Ok(())
}
