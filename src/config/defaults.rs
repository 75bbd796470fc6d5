//! Default value functions for configuration.
//!
//! Separated into its own module for clarity and reuse.

use crate::gate::Remediation;
use std::net::SocketAddr;

/// Returns `true` (for serde defaults).
pub fn default_true() -> bool {
    true
}

// =============================================================================
// LAPI Defaults
// =============================================================================

pub fn default_poll_interval() -> u64 {
    10
}

pub fn default_request_timeout() -> u64 {
    5
}

pub fn default_initial_backoff() -> u64 {
    1
}

pub fn default_max_backoff() -> u64 {
    60
}

// =============================================================================
// Store Defaults
// =============================================================================

pub fn default_sweep_interval() -> u64 {
    60
}

// =============================================================================
// Resolver Defaults
// =============================================================================

pub fn default_resolver_cache_ttl() -> u64 {
    3600
}

pub fn default_resolver_cache_max_size() -> usize {
    100_000
}

// =============================================================================
// HTTP Defaults
// =============================================================================

pub fn default_http_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 9100))
}

pub fn default_forward_header() -> String {
    "X-Real-IP".to_string()
}

// =============================================================================
// Remediation Defaults
// =============================================================================

pub fn default_fallback_remediation() -> Remediation {
    Remediation::Ban
}
