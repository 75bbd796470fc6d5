//! Telemetry utilities for evaluation timing and standard spans.

use std::time::Instant;

/// Guard for timing a gate evaluation.
///
/// Records latency when dropped.
pub struct EvaluationTimer {
    start: Instant,
}

impl EvaluationTimer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for EvaluationTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for EvaluationTimer {
    fn drop(&mut self) {
        crate::metrics::record_evaluation(self.start.elapsed().as_secs_f64());
    }
}

/// Standardized span constructors.
pub mod spans {
    use std::net::IpAddr;
    use tracing::{Span, debug_span, info_span};

    /// Span for one decision stream poll.
    pub fn sync_poll(startup: bool) -> Span {
        info_span!("sync_poll", startup = startup)
    }

    /// Span for one gate evaluation. Debug level: this is the hot path.
    pub fn evaluate(client: &IpAddr) -> Span {
        debug_span!("evaluate", client = %client)
    }
}
