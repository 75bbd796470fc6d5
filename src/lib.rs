//! lapi-gate - decision sync and enforcement agent.
//!
//! Mirrors the active decisions of a LAPI authority into a local store and
//! answers, for each inbound request, whether its origin is currently
//! banned.
//!
//! ```text
//!  LAPI ──poll──> SyncClient ──apply──> DecisionStore <──query── EnforcementGate <── /v1/check
//!                                            ^                         |
//!                                         sweeper              OriginResolver
//! ```

pub mod config;
pub mod decision;
pub mod error;
pub mod gate;
pub mod http;
pub mod matcher;
pub mod metrics;
pub mod prefix_trie;
pub mod resolver;
pub mod store;
pub mod sync;
pub mod telemetry;

pub use decision::{Decision, DecisionId, RawDecision, Scope, Target};
pub use gate::{Action, EnforcementGate, Remediation, RemediationPolicy, Verdict};
pub use store::DecisionStore;
