//! The sync loop.
//!
//! Polls the [`DecisionSource`] on a fixed interval and applies every event
//! to the store. Failures never touch the store: the loop backs off and
//! retries while enforcement continues on what is already held.

use super::backoff::Backoff;
use super::{DecisionSource, StreamResponse, SyncEvent, SyncState};
use crate::error::SyncError;
use crate::metrics;
use crate::store::DecisionStore;
use crate::telemetry;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, warn};

/// Result of applying one stream response.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ApplyReport {
    pub added: usize,
    pub deleted: usize,
    pub rejected: usize,
}

pub struct SyncClient<S> {
    source: S,
    store: Arc<DecisionStore>,
    poll_interval: Duration,
    backoff: Backoff,
    /// Set after the first successful poll; until then we ask for the snapshot.
    synced: bool,
    state_tx: watch::Sender<SyncState>,
}

impl<S: DecisionSource> SyncClient<S> {
    pub fn new(
        source: S,
        store: Arc<DecisionStore>,
        poll_interval: Duration,
        backoff: Backoff,
    ) -> Self {
        let (state_tx, _) = watch::channel(SyncState::Disconnected);
        Self {
            source,
            store,
            poll_interval,
            backoff,
            synced: false,
            state_tx,
        }
    }

    /// Subscribe to state transitions.
    pub fn state(&self) -> watch::Receiver<SyncState> {
        self.state_tx.subscribe()
    }

    fn set_state(&self, state: SyncState) {
        self.state_tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                debug!(from = current.as_str(), to = state.as_str(), "Sync state change");
                *current = state;
                true
            }
        });
    }

    /// Poll once and apply the response.
    ///
    /// Requests the full snapshot until a poll has succeeded.
    pub async fn poll_once(&mut self) -> Result<ApplyReport, SyncError> {
        let startup = !self.synced;
        if !matches!(*self.state_tx.borrow(), SyncState::Streaming) {
            self.set_state(SyncState::Connecting);
        }

        let response = self
            .source
            .poll(startup)
            .instrument(telemetry::spans::sync_poll(startup))
            .await?;

        let report = self.apply(response);
        self.synced = true;
        self.set_state(SyncState::Streaming);

        if startup {
            info!(
                added = report.added,
                rejected = report.rejected,
                "Initial decision snapshot applied"
            );
        } else if report != ApplyReport::default() {
            info!(
                added = report.added,
                deleted = report.deleted,
                rejected = report.rejected,
                "Decision stream applied"
            );
        }
        Ok(report)
    }

    /// Apply a response: deletions first, then additions, in received order.
    ///
    /// Each event is applied under its own store write lock.
    pub fn apply(&self, response: StreamResponse) -> ApplyReport {
        let mut report = ApplyReport::default();

        for event in response.into_events() {
            let event = match event {
                Ok(event) => event,
                Err(e) => {
                    warn!(error = %e, "Skipping unusable deletion");
                    metrics::record_rejected(e.error_code());
                    report.rejected += 1;
                    continue;
                }
            };
            metrics::record_sync_event(event.kind());

            match event {
                SyncEvent::Delete(id) => {
                    if self.store.delete_by_id(&id) {
                        report.deleted += 1;
                    }
                }
                SyncEvent::DeleteByFilter(target) => {
                    report.deleted += self.store.delete_matching(&target);
                }
                SyncEvent::Add(raw) => {
                    let inserted = self.store.insert(std::iter::once(raw));
                    report.added += inserted.inserted;
                    for (_, e) in &inserted.rejected {
                        metrics::record_rejected(e.error_code());
                    }
                    report.rejected += inserted.rejected.len();
                }
            }
        }

        metrics::set_active_decisions(&self.store.counts());
        report
    }

    /// Run until `cancel` fires.
    ///
    /// An in-flight request is abandoned on cancellation. Event application
    /// has no await points, so it always runs to completion.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!(interval = ?self.poll_interval, "Sync loop started");

        loop {
            let result = tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.poll_once() => result,
            };

            let wait = match result {
                Ok(_) => {
                    metrics::record_sync_poll("ok");
                    self.backoff.reset();
                    self.poll_interval
                }
                Err(e) => {
                    metrics::record_sync_poll(e.error_code());
                    let retry_in = self.backoff.next_delay();
                    warn!(
                        error = %e,
                        attempt = self.backoff.attempt(),
                        retry_in = ?retry_in,
                        held = self.store.len(),
                        "Decision stream poll failed, backing off"
                    );
                    self.set_state(SyncState::Backoff {
                        attempt: self.backoff.attempt(),
                        retry_in,
                        last_error: e.to_string(),
                    });
                    retry_in
                }
            };

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }
        }

        self.set_state(SyncState::Disconnected);
        info!("Sync loop stopped");
    }
}

impl<S: DecisionSource + 'static> SyncClient<S> {
    /// Spawn [`run`](Self::run) on the runtime.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }
}
