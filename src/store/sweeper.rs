//! Expired decision sweeper.
//!
//! Lazy expiry keeps enforcement correct on its own; the sweeper only bounds
//! memory by evicting what queries already ignore.

use super::DecisionStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Spawn the periodic sweep task.
///
/// Runs until `cancel` fires. Also refreshes the active decision gauges so
/// they drift back down as decisions age out.
pub fn spawn_sweep_task(
    store: Arc<DecisionStore>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately; nothing to sweep yet.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Sweeper shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    let swept = store.sweep();
                    if swept > 0 {
                        crate::metrics::record_swept(swept);
                    }
                    crate::metrics::set_active_decisions(&store.counts());
                    debug!(swept, remaining = store.len(), "Sweep pass complete");
                }
            }
        }
    })
}
