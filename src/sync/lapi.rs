//! HTTP client for the LAPI decision stream.

use super::{DecisionSource, StreamResponse};
use crate::config::LapiConfig;
use crate::decision::Scope;
use crate::error::SyncError;
use async_trait::async_trait;
use reqwest::Url;
use std::time::Duration;
use tracing::{debug, info};

const STREAM_PATH: &str = "v1/decisions/stream";
const USER_AGENT: &str = concat!("lapi-gate/", env!("CARGO_PKG_VERSION"));

/// Polls `GET {url}/v1/decisions/stream`.
pub struct LapiClient {
    http_client: reqwest::Client,
    stream_url: Url,
    api_key: String,
    /// Filters sent on every poll, built once.
    query: Vec<(&'static str, String)>,
}

impl LapiClient {
    /// Build a client requesting decisions of `scopes`.
    pub fn new(config: &LapiConfig, scopes: &[Scope]) -> Result<Self, SyncError> {
        let mut base =
            Url::parse(&config.url).map_err(|e| SyncError::InvalidUrl(format!("{}: {}", config.url, e)))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(SyncError::InvalidUrl(config.url.clone()));
        }
        // Keep any path prefix: join() replaces the last segment otherwise.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let stream_url = base
            .join(STREAM_PATH)
            .map_err(|e| SyncError::InvalidUrl(e.to_string()))?;

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| SyncError::Unavailable(e.to_string()))?;

        let query = stream_query(config, scopes);
        info!(url = %stream_url, scopes = ?scopes, "LAPI client initialized");

        Ok(Self {
            http_client,
            stream_url,
            api_key: config.api_key.clone(),
            query,
        })
    }

    pub fn stream_url(&self) -> &Url {
        &self.stream_url
    }

    pub fn query(&self) -> &[(&'static str, String)] {
        &self.query
    }
}

/// Static query parameters: scope list plus the scenario and origin filters.
fn stream_query(config: &LapiConfig, scopes: &[Scope]) -> Vec<(&'static str, String)> {
    let mut query = Vec::new();

    let scopes: Vec<&str> = scopes.iter().map(Scope::as_str).collect();
    query.push(("scopes", scopes.join(",")));

    let filters = [
        ("scenarios_containing", &config.include_scenarios_containing),
        ("scenarios_not_containing", &config.exclude_scenarios_containing),
        ("origins", &config.only_include_decisions_from),
    ];
    for (name, values) in filters {
        if !values.is_empty() {
            query.push((name, values.join(",")));
        }
    }

    query
}

#[async_trait]
impl DecisionSource for LapiClient {
    async fn poll(&self, startup: bool) -> Result<StreamResponse, SyncError> {
        let response = self
            .http_client
            .get(self.stream_url.clone())
            .query(&[("startup", if startup { "true" } else { "false" })])
            .query(&self.query)
            .header("X-Api-Key", &self.api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Status(status.as_u16()));
        }

        let body: StreamResponse = response
            .json()
            .await
            .map_err(|e| SyncError::Decode(e.to_string()))?;
        debug!(
            startup,
            new = body.new.as_ref().map_or(0, Vec::len),
            deleted = body.deleted.as_ref().map_or(0, Vec::len),
            "Polled decision stream"
        );
        Ok(body)
    }
}
