//! In-process agent wired the way the binary wires it, pointed at a
//! [`MockLapi`] and listening on an ephemeral port.

use super::lapi::{API_KEY, MockLapi};
use lapi_gate::config::Config;
use lapi_gate::decision::Scope;
use lapi_gate::gate::{EnforcementGate, RemediationPolicy};
use lapi_gate::http::{self, AppState};
use lapi_gate::resolver::{CachedResolver, TableResolver};
use lapi_gate::store::{self, DecisionStore};
use lapi_gate::sync::{Backoff, LapiClient, SyncClient, SyncState};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::watch;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;

/// Poll interval used by tests.
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How long a change may take to become visible on the request path.
pub const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

pub struct TestGate {
    pub lapi: MockLapi,
    pub store: Arc<DecisionStore>,
    pub sync_state: watch::Receiver<SyncState>,
    addr: SocketAddr,
    client: reqwest::Client,
    cancel: CancellationToken,
    _tables: TempDir,
}

impl TestGate {
    /// Agent with every scope enabled. The tables map `127.0.0.1` to
    /// country `US` and AS 12300.
    pub async fn start() -> anyhow::Result<Self> {
        Self::start_with(MockLapi::start().await?, API_KEY).await
    }

    /// Agent against an existing mock, authenticating with `api_key`.
    pub async fn start_with(lapi: MockLapi, api_key: &str) -> anyhow::Result<Self> {
        let tables = TempDir::new()?;
        let countries = tables.path().join("countries.json");
        let asns = tables.path().join("asn.json");
        std::fs::write(
            &countries,
            r#"{"networks": [{"network": "127.0.0.1/32", "country": "US"}]}"#,
        )?;
        std::fs::write(
            &asns,
            r#"{"networks": [{"network": "127.0.0.1/32", "asn": 12300, "organization": "Test AS"}]}"#,
        )?;

        let config: Config = toml::from_str(&format!(
            r#"
[lapi]
url = "{url}"
api_key = "{api_key}"
request_timeout_secs = 2
initial_backoff_secs = 1
max_backoff_secs = 1

[country_remediations]
enabled = true
database_path = {countries:?}

[as_remediations]
enabled = true
database_path = {asns:?}

[http]
listen = "127.0.0.1:0"
"#,
            url = lapi.url(),
            countries = countries.display().to_string(),
            asns = asns.display().to_string(),
        ))?;
        if let Err(errors) = lapi_gate::config::validate(&config) {
            anyhow::bail!("invalid test config: {:?}", errors);
        }

        lapi_gate::metrics::init();

        let mut table = TableResolver::new();
        table.load_countries(&countries)?;
        table.load_asns(&asns)?;
        let resolver = Arc::new(CachedResolver::new(table, Duration::from_secs(60), 1000));

        let cancel = CancellationToken::new();
        let store = Arc::new(DecisionStore::new());

        let lapi_client = LapiClient::new(
            &config.lapi,
            &[Scope::Ip, Scope::Range, Scope::As, Scope::Country],
        )?;
        let sync = SyncClient::new(
            lapi_client,
            Arc::clone(&store),
            POLL_INTERVAL,
            Backoff::new(Duration::from_millis(50), Duration::from_millis(200)),
        );
        let sync_state = sync.state();
        sync.spawn(cancel.clone());
        store::spawn_sweep_task(Arc::clone(&store), Duration::from_millis(100), cancel.clone());

        let gate = Arc::new(
            EnforcementGate::new(Arc::clone(&store)).with_geo_scopes(resolver, true, true),
        );
        let state = Arc::new(AppState::new(
            gate,
            RemediationPolicy::from_config(&config),
            sync_state.clone(),
            &config.http.trusted_forward_header,
            http::DEFAULT_BAN_PAGE.to_string(),
        )?);

        let listener = tokio::net::TcpListener::bind(config.http.listen).await?;
        let addr = listener.local_addr()?;
        tokio::spawn(http::run_http_server(listener, state, cancel.clone()));

        Ok(Self {
            lapi,
            store,
            sync_state,
            addr,
            client: reqwest::Client::new(),
            cancel,
            _tables: tables,
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Forward-auth check for a client address.
    pub async fn check(&self, client_ip: &str) -> anyhow::Result<reqwest::Response> {
        Ok(self
            .client
            .get(self.url("/v1/check"))
            .header("X-Real-IP", client_ip)
            .send()
            .await?)
    }

    /// Poll `/v1/check` until it answers `expected`, or fail after the settle window.
    pub async fn wait_for_status(&self, client_ip: &str, expected: u16) -> anyhow::Result<()> {
        let deadline = Instant::now() + SETTLE_TIMEOUT;
        loop {
            let status = self.check(client_ip).await?.status().as_u16();
            if status == expected {
                return Ok(());
            }
            if Instant::now() >= deadline {
                anyhow::bail!("{} still answered {} (wanted {})", client_ip, status, expected);
            }
            sleep(Duration::from_millis(20)).await;
        }
    }

    /// Wait until the sync state satisfies `pred`.
    pub async fn wait_for_state(
        &mut self,
        pred: impl Fn(&SyncState) -> bool,
    ) -> anyhow::Result<SyncState> {
        let deadline = Instant::now() + SETTLE_TIMEOUT;
        loop {
            {
                let state = self.sync_state.borrow_and_update();
                if pred(&state) {
                    return Ok(state.clone());
                }
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            match tokio::time::timeout(remaining, self.sync_state.changed()).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) => anyhow::bail!("sync loop exited"),
                Err(_) => anyhow::bail!(
                    "sync state never matched (last: {:?})",
                    *self.sync_state.borrow()
                ),
            }
        }
    }
}

impl Drop for TestGate {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
