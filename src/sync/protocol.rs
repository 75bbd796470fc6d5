//! Decision stream wire types.
//!
//! LAPI answers both the startup snapshot and incremental polls with the
//! same shape:
//!
//! ```json
//! { "new": [ { "id": 1, "scope": "Ip", "value": "127.0.0.1", ... } ],
//!   "deleted": null }
//! ```
//!
//! Either list may be `null` or missing.

use crate::decision::{DecisionId, RawDecision, Scope, Target};
use crate::error::DecisionError;
use serde::{Deserialize, Serialize};

/// One poll's worth of changes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamResponse {
    #[serde(default)]
    pub new: Option<Vec<RawDecision>>,
    #[serde(default)]
    pub deleted: Option<Vec<RawDecision>>,
}

/// A single mutation to apply to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    Add(RawDecision),
    Delete(DecisionId),
    /// Delete every decision with this exact scope and value.
    DeleteByFilter(Target),
}

impl SyncEvent {
    /// Label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            SyncEvent::Add(_) => "add",
            SyncEvent::Delete(_) => "delete",
            SyncEvent::DeleteByFilter(_) => "delete_by_filter",
        }
    }
}

impl StreamResponse {
    pub fn is_empty(&self) -> bool {
        self.new.as_ref().is_none_or(Vec::is_empty)
            && self.deleted.as_ref().is_none_or(Vec::is_empty)
    }

    /// Flatten into events in application order: every deletion first, then
    /// every addition, each list in received order.
    ///
    /// A deletion without an id and with an unusable scope or value cannot be
    /// applied and is returned as an error in its slot.
    pub fn into_events(self) -> Vec<Result<SyncEvent, DecisionError>> {
        let deleted = self.deleted.unwrap_or_default();
        let new = self.new.unwrap_or_default();

        let mut events = Vec::with_capacity(deleted.len() + new.len());
        events.extend(deleted.into_iter().map(deletion_event));
        events.extend(new.into_iter().map(|raw| Ok(SyncEvent::Add(raw))));
        events
    }
}

fn deletion_event(raw: RawDecision) -> Result<SyncEvent, DecisionError> {
    if let Some(id) = &raw.id {
        return Ok(SyncEvent::Delete(id.to_decision_id()));
    }
    let scope: Scope = raw
        .scope
        .as_deref()
        .ok_or(DecisionError::MissingField("scope"))?
        .parse()?;
    let value = raw.value.as_deref().ok_or(DecisionError::MissingField("value"))?;
    Ok(SyncEvent::DeleteByFilter(Target::parse(scope, value)?))
}
