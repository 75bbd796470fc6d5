//! Mock LAPI.
//!
//! Serves `GET /v1/decisions/stream` the way LAPI does: the startup poll
//! returns every active decision, later polls return what changed since the
//! previous poll. Decisions are managed the way `cscli decisions add/delete`
//! would.

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use lapi_gate::decision::{RawDecision, WireId};
use lapi_gate::sync::StreamResponse;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub const API_KEY: &str = "test-bouncer-key";

#[derive(Default)]
struct MockState {
    next_id: u64,
    active: Vec<RawDecision>,
    pending_new: Vec<RawDecision>,
    pending_deleted: Vec<RawDecision>,
    /// Answer every poll with 503.
    failing: bool,
    /// `startup` flag of every poll received.
    polls: Vec<bool>,
}

pub struct MockLapi {
    state: Arc<Mutex<MockState>>,
    addr: SocketAddr,
    cancel: CancellationToken,
}

impl MockLapi {
    pub async fn start() -> anyhow::Result<Self> {
        let state = Arc::new(Mutex::new(MockState {
            next_id: 1,
            ..MockState::default()
        }));
        let app = Router::new()
            .route("/v1/decisions/stream", get(stream_handler))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let cancel = CancellationToken::new();
        let shutdown = cancel.clone();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await;
        });

        Ok(Self {
            state,
            addr,
            cancel,
        })
    }

    pub fn url(&self) -> String {
        format!("http://{}/", self.addr)
    }

    /// Add a decision, as `cscli decisions add` does. Returns its id.
    pub fn insert_decision(&self, scope: &str, value: &str, duration: &str, kind: &str) -> u64 {
        let id = {
            let mut state = self.state.lock();
            let id = state.next_id;
            state.next_id += 1;
            id
        };
        self.push(WireId::Number(id), scope, value, duration, kind);
        id
    }

    /// Ban-type shorthand for [`insert_decision`](Self::insert_decision).
    pub fn insert_decisions(&self, scope: &str, value: &str, duration: &str) -> u64 {
        self.insert_decision(scope, value, duration, "ban")
    }

    /// Ban decision with a caller-chosen string id, sent verbatim.
    pub fn insert_ban_with_id(&self, id: &str, scope: &str, value: &str, duration: &str) {
        self.push(WireId::Text(id.to_string()), scope, value, duration, "ban");
    }

    fn push(&self, id: WireId, scope: &str, value: &str, duration: &str, kind: &str) {
        let mut decision = RawDecision::new("", scope, value, duration)
            .with_type(kind)
            .with_origin("cscli");
        decision.id = Some(id);
        decision.scenario = Some(format!("manual '{}' from 'test'", kind));

        let mut state = self.state.lock();
        state.active.push(decision.clone());
        state.pending_new.push(decision);
    }

    /// Delete every active decision on `value`, as `cscli decisions delete --ip` does.
    pub fn delete_decisions_by_ip(&self, value: &str) -> usize {
        let mut state = self.state.lock();
        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut state.active)
            .into_iter()
            .partition(|d| d.value.as_deref() == Some(value));
        state.active = kept;
        state
            .pending_new
            .retain(|d| d.value.as_deref() != Some(value));
        let count = removed.len();
        state.pending_deleted.extend(removed);
        count
    }

    pub fn set_failing(&self, failing: bool) {
        self.state.lock().failing = failing;
    }

    /// `startup` flags of the polls received so far.
    pub fn polls(&self) -> Vec<bool> {
        self.state.lock().polls.clone()
    }
}

impl Drop for MockLapi {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn stream_handler(
    State(state): State<Arc<Mutex<MockState>>>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let mut state = state.lock();
    let startup = params.get("startup").map(String::as_str) == Some("true");
    state.polls.push(startup);

    if headers.get("x-api-key").and_then(|v| v.to_str().ok()) != Some(API_KEY) {
        return StatusCode::FORBIDDEN.into_response();
    }
    if state.failing {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    let scopes: Vec<String> = params
        .get("scopes")
        .map(|s| s.split(',').map(str::to_ascii_lowercase).collect())
        .unwrap_or_else(|| vec!["ip".to_string()]);
    let wanted = |d: &RawDecision| {
        d.scope
            .as_deref()
            .is_some_and(|s| scopes.contains(&s.to_ascii_lowercase()))
    };

    let (new, deleted) = if startup {
        state.pending_new.clear();
        state.pending_deleted.clear();
        (state.active.clone(), Vec::new())
    } else {
        (
            std::mem::take(&mut state.pending_new),
            std::mem::take(&mut state.pending_deleted),
        )
    };

    let new: Vec<_> = new.into_iter().filter(|d| wanted(d)).collect();
    let deleted: Vec<_> = deleted.into_iter().filter(|d| wanted(d)).collect();

    Json(StreamResponse {
        new: (!new.is_empty()).then_some(new),
        deleted: (!deleted.is_empty()).then_some(deleted),
    })
    .into_response()
}
