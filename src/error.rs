//! Unified error handling for lapi-gate.
//!
//! One error enum per concern. Every enum exposes a static `error_code()`
//! used to label metrics, mirroring how failures are reported to logs.

use crate::decision::Scope;
use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// Decision Errors (ingestion)
// ============================================================================

/// A decision received from the authority could not be accepted.
///
/// The offending entry is skipped; the rest of its batch is still applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecisionError {
    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("unknown scope: {0}")]
    UnknownScope(String),

    #[error("invalid {scope} value: {value}")]
    InvalidValue { scope: Scope, value: String },

    #[error("invalid duration: {0}")]
    InvalidDuration(String),

    #[error("decision already expired (duration {0})")]
    AlreadyExpired(String),
}

impl DecisionError {
    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MissingField(_) => "missing_field",
            Self::UnknownScope(_) => "unknown_scope",
            Self::InvalidValue { .. } => "invalid_value",
            Self::InvalidDuration(_) => "invalid_duration",
            Self::AlreadyExpired(_) => "already_expired",
        }
    }
}

// ============================================================================
// Sync Errors (authority link)
// ============================================================================

/// Failures talking to the authority.
///
/// None of these reach the request path: the sync loop backs off and retries
/// while the store keeps enforcing what it already holds.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("authority unavailable: {0}")]
    Unavailable(String),

    #[error("authority returned HTTP {0}")]
    Status(u16),

    #[error("malformed stream response: {0}")]
    Decode(String),

    #[error("invalid authority url: {0}")]
    InvalidUrl(String),
}

impl SyncError {
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "unavailable",
            Self::Status(_) => "status",
            Self::Decode(_) => "decode",
            Self::InvalidUrl(_) => "invalid_url",
        }
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Decode(e.to_string())
        } else if let Some(status) = e.status() {
            Self::Status(status.as_u16())
        } else {
            Self::Unavailable(e.to_string())
        }
    }
}

// ============================================================================
// Resolver Errors (network table loading)
// ============================================================================

/// Errors loading a country or AS network table.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("failed to read network table {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse network table {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid network '{network}' in {path}")]
    InvalidNetwork { path: PathBuf, network: String },
}

impl ResolveError {
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Io { .. } => "io",
            Self::Parse { .. } => "parse",
            Self::InvalidNetwork { .. } => "invalid_network",
        }
    }
}

// ============================================================================
// Gate Errors (request path)
// ============================================================================

/// Errors surfaced to the proxy adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateError {
    #[error("invalid client address: {0}")]
    InvalidAddress(String),
}

impl GateError {
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidAddress(_) => "invalid_address",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_error_codes() {
        assert_eq!(DecisionError::MissingField("id").error_code(), "missing_field");
        assert_eq!(
            DecisionError::InvalidValue {
                scope: Scope::Range,
                value: "10.0.0.0/33".into()
            }
            .error_code(),
            "invalid_value"
        );
        assert_eq!(DecisionError::AlreadyExpired("-1s".into()).error_code(), "already_expired");
    }

    #[test]
    fn test_decision_error_display() {
        let err = DecisionError::InvalidValue {
            scope: Scope::As,
            value: "acme".into(),
        };
        assert_eq!(err.to_string(), "invalid as value: acme");
    }

    #[test]
    fn test_sync_error_codes() {
        assert_eq!(SyncError::Status(503).error_code(), "status");
        assert_eq!(SyncError::Unavailable("refused".into()).error_code(), "unavailable");
        assert_eq!(SyncError::Status(403).to_string(), "authority returned HTTP 403");
    }
}
