//! Prometheus metrics collection for lapi-gate.
//!
//! Exposed in text format on `GET /metrics` by the HTTP adapter.
//!
//! - `lapi_gate_decisions_active{scope}` - Held decisions per scope (gauge)
//! - `lapi_gate_verdicts_total{remediation}` - Verdicts served
//! - `lapi_gate_sync_polls_total{result}` - Stream polls by outcome
//! - `lapi_gate_sync_events_total{kind}` - Stream events applied
//! - `lapi_gate_decisions_rejected_total{error}` - Decisions skipped as invalid
//! - `lapi_gate_decisions_swept_total` - Expired decisions evicted
//! - `lapi_gate_evaluate_duration_seconds` - Gate evaluation latency

use crate::decision::Scope;
use crate::store::ScopeCounts;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGaugeVec, Opts, Registry,
    TextEncoder,
};
use std::sync::OnceLock;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

// ========================================================================
// Counters (monotonic increasing)
// ========================================================================

/// Verdicts by remediation (pass, ban, captcha).
pub static VERDICTS: OnceLock<IntCounterVec> = OnceLock::new();

/// Stream polls by result (`ok` or a sync error code).
pub static SYNC_POLLS: OnceLock<IntCounterVec> = OnceLock::new();

/// Stream events applied by kind.
pub static SYNC_EVENTS: OnceLock<IntCounterVec> = OnceLock::new();

/// Decisions rejected at ingestion, by error code.
pub static DECISIONS_REJECTED: OnceLock<IntCounterVec> = OnceLock::new();

/// Expired decisions evicted by the sweeper.
pub static DECISIONS_SWEPT: OnceLock<IntCounter> = OnceLock::new();

// ========================================================================
// Gauges (can increase/decrease)
// ========================================================================

/// Held decisions per scope.
pub static DECISIONS_ACTIVE: OnceLock<IntGaugeVec> = OnceLock::new();

// ========================================================================
// Latency
// ========================================================================

pub static EVALUATE_LATENCY: OnceLock<Histogram> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Call once at startup. Recording before `init()` is a silent no-op.
pub fn init() {
    let r = registry();

    // Helper macro to register metric
    macro_rules! register {
        ($metric:ident, $init:expr) => {
            match $init {
                Ok(m) => {
                    if let Err(e) = r.register(Box::new(m.clone())) {
                        tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
                    }
                    let _ = $metric.set(m);
                }
                Err(e) => {
                    tracing::error!(error = %e, concat!("Failed to create metric ", stringify!($metric)));
                }
            }
        };
    }

    register!(VERDICTS, IntCounterVec::new(Opts::new("lapi_gate_verdicts_total", "Verdicts served by remediation"), &["remediation"]));
    register!(SYNC_POLLS, IntCounterVec::new(Opts::new("lapi_gate_sync_polls_total", "Decision stream polls by result"), &["result"]));
    register!(SYNC_EVENTS, IntCounterVec::new(Opts::new("lapi_gate_sync_events_total", "Decision stream events applied by kind"), &["kind"]));
    register!(DECISIONS_REJECTED, IntCounterVec::new(Opts::new("lapi_gate_decisions_rejected_total", "Decisions rejected at ingestion by error"), &["error"]));
    register!(DECISIONS_SWEPT, IntCounter::new("lapi_gate_decisions_swept_total", "Expired decisions evicted"));
    register!(DECISIONS_ACTIVE, IntGaugeVec::new(Opts::new("lapi_gate_decisions_active", "Held decisions per scope"), &["scope"]));
    register!(EVALUATE_LATENCY, Histogram::with_opts(
        HistogramOpts::new("lapi_gate_evaluate_duration_seconds", "Gate evaluation latency")
            .buckets(vec![0.000001, 0.000005, 0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.005, 0.01])));
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Prometheus metrics were not valid UTF-8");
            String::new()
        }
    }
}

// ============================================================================
// Helper functions for metric updates
// ============================================================================

fn inc_label(metric: &OnceLock<IntCounterVec>, label: &str) {
    if let Some(c) = metric.get() {
        c.with_label_values(&[label]).inc();
    }
}

#[inline]
pub fn record_verdict(remediation: &str) {
    inc_label(&VERDICTS, remediation);
}

#[inline]
pub fn record_sync_poll(result: &str) {
    inc_label(&SYNC_POLLS, result);
}

#[inline]
pub fn record_sync_event(kind: &str) {
    inc_label(&SYNC_EVENTS, kind);
}

#[inline]
pub fn record_rejected(error: &str) {
    inc_label(&DECISIONS_REJECTED, error);
}

#[inline]
pub fn record_swept(count: usize) {
    if let Some(c) = DECISIONS_SWEPT.get() {
        c.inc_by(count as u64);
    }
}

/// Record one gate evaluation.
#[inline]
pub fn record_evaluation(duration_secs: f64) {
    if let Some(h) = EVALUATE_LATENCY.get() {
        h.observe(duration_secs);
    }
}

/// Publish held decision counts.
pub fn set_active_decisions(counts: &ScopeCounts) {
    if let Some(g) = DECISIONS_ACTIVE.get() {
        for scope in Scope::PRECEDENCE {
            g.with_label_values(&[scope.as_str()])
                .set(counts.get(scope) as i64);
        }
    }
}
