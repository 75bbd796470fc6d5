//! HTTP adapter: forward-auth endpoint, health, and Prometheus metrics.
//!
//! The fronting proxy (nginx `auth_request`, Traefik `forwardAuth`, ...)
//! calls `GET /v1/check` for every request and enforces the status code:
//!
//! - `200` pass
//! - `403` ban (body is the ban page)
//! - `401` captcha
//!
//! The remediation name is also returned in `X-Remediation`.

use crate::config::BanConfig;
use crate::error::GateError;
use crate::gate::{EnforcementGate, Remediation, RemediationPolicy};
use crate::sync::SyncState;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Response header carrying the remediation name.
pub const REMEDIATION_HEADER: &str = "x-remediation";


/// Served with 403 responses when `[ban] template_path` is unset.
pub const DEFAULT_BAN_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>Access denied</title></head>
<body>
<h1>Access denied</h1>
<p>Your address has been blocked by this site's security policy.</p>
</body>
</html>
"#;

/// Shared handler state.
pub struct AppState {
    pub gate: Arc<EnforcementGate>,
    pub policy: RemediationPolicy,
    pub sync_state: watch::Receiver<SyncState>,
    pub forward_header: HeaderName,
    pub ban_page: String,
}

impl AppState {
    pub fn new(
        gate: Arc<EnforcementGate>,
        policy: RemediationPolicy,
        sync_state: watch::Receiver<SyncState>,
        forward_header: &str,
        ban_page: String,
    ) -> Result<Self, axum::http::header::InvalidHeaderName> {
        Ok(Self {
            gate,
            policy,
            sync_state,
            forward_header: HeaderName::try_from(forward_header.trim())?,
            ban_page,
        })
    }
}

/// Read the ban page template, or fall back to the built-in one.
pub fn load_ban_page(config: &BanConfig) -> std::io::Result<String> {
    match &config.template_path {
        Some(path) => std::fs::read_to_string(path),
        None => Ok(DEFAULT_BAN_PAGE.to_string()),
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/check", get(check_handler))
        .route("/healthz", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Serve until `cancel` fires.
pub async fn run_http_server(
    listener: TcpListener,
    state: Arc<AppState>,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "HTTP server listening");
    }
    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move { cancel.cancelled().await })
    .await
}

/// Client address: the configured trusted header, else the TCP peer.
///
/// Other forwarding headers are ignored; the proxy passes the client's own
/// headers through. A list-valued trusted header yields its last hop, the
/// one appended by the proxy.
pub fn client_address(
    headers: &HeaderMap,
    forward_header: &HeaderName,
    peer: Option<SocketAddr>,
) -> Result<IpAddr, GateError> {
    if let Some(value) = headers.get(forward_header) {
        let raw = value
            .to_str()
            .map_err(|_| GateError::InvalidAddress(String::from_utf8_lossy(value.as_bytes()).into_owned()))?;
        let last_hop = raw.rsplit(',').next().unwrap_or_default().trim();
        return last_hop
            .parse::<IpAddr>()
            .map(|ip| ip.to_canonical())
            .map_err(|_| GateError::InvalidAddress(raw.to_string()));
    }

    peer.map(|p| p.ip().to_canonical())
        .ok_or_else(|| GateError::InvalidAddress("no client address".to_string()))
}

async fn check_handler(
    State(state): State<Arc<AppState>>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
) -> Response {
    let addr = match client_address(&headers, &state.forward_header, peer.map(|c| c.0)) {
        Ok(addr) => addr,
        Err(e) => {
            warn!(error = %e, "Rejecting check request");
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };

    let verdict = state.gate.evaluate(addr);
    let remediation = state.policy.remediation(&verdict);
    crate::metrics::record_verdict(remediation.as_str());

    if let Some(decision) = &verdict.matched {
        debug!(client = %addr, id = %decision.id, remediation = %remediation, "Check verdict");
    }

    let mut response = match remediation {
        Remediation::Pass => StatusCode::OK.into_response(),
        Remediation::Ban => (StatusCode::FORBIDDEN, Html(state.ban_page.clone())).into_response(),
        Remediation::Captcha => StatusCode::UNAUTHORIZED.into_response(),
    };
    response.headers_mut().insert(
        HeaderName::from_static(REMEDIATION_HEADER),
        HeaderValue::from_static(remediation.as_str()),
    );
    response
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let sync = state.sync_state.borrow().clone();
    let counts = state.gate.store().counts();

    let mut body = json!({
        "status": "ok",
        "sync": sync.as_str(),
        "decisions": {
            "total": state.gate.store().len(),
            "ip": counts.ip,
            "range": counts.range,
            "country": counts.country,
            "as": counts.as_,
        },
    });
    if let SyncState::Backoff {
        attempt,
        retry_in,
        last_error,
    } = sync
    {
        body["backoff"] = json!({
            "attempt": attempt,
            "retry_in_ms": retry_in.as_millis() as u64,
            "last_error": last_error,
        });
    }
    Json(body)
}

/// Handler for GET /metrics - returns Prometheus metrics in text format.
async fn metrics_handler() -> String {
    crate::metrics::gather_metrics()
}
