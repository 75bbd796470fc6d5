//! Sync Module - keeps the local store in step with the authority.
//!
//! The authority (LAPI) is the single source of truth. This module polls its
//! decision stream, asking for the full snapshot first and incremental
//! changes afterwards, and applies the changes to the [`DecisionStore`].
//!
//! State machine:
//!
//! ```text
//! Disconnected -> Connecting -> Streaming
//!                    ^              |
//!                    |           (error)
//!                    +-- Backoff <--+
//! ```
//!
//! [`DecisionStore`]: crate::store::DecisionStore

mod backoff;
mod client;
mod lapi;
pub mod protocol;

pub use backoff::Backoff;
pub use client::{ApplyReport, SyncClient};
pub use lapi::LapiClient;
pub use protocol::{StreamResponse, SyncEvent};

use crate::error::SyncError;
use async_trait::async_trait;
use std::time::Duration;

/// Link state, observable through [`SyncClient::state`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncState {
    Disconnected,
    Connecting,
    Streaming,
    Backoff {
        attempt: u32,
        retry_in: Duration,
        last_error: String,
    },
}

impl SyncState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncState::Disconnected => "disconnected",
            SyncState::Connecting => "connecting",
            SyncState::Streaming => "streaming",
            SyncState::Backoff { .. } => "backoff",
        }
    }
}

/// Where decisions come from.
#[async_trait]
pub trait DecisionSource: Send + Sync {
    /// Fetch the next batch of changes. `startup` asks for every active
    /// decision instead of the changes since the previous poll.
    async fn poll(&self, startup: bool) -> Result<StreamResponse, SyncError>;
}
