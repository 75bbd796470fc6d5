//! Request-path enforcement.
//!
//! The gate turns a client address into a verdict by probing the store in
//! fixed scope precedence (`ip`, `range`, `country`, `as`). The first active
//! match denies and is reported; no match allows. The gate never writes to
//! the store.

mod remediation;

pub use remediation::{Remediation, RemediationPolicy};

use crate::decision::{Decision, Scope};
use crate::error::GateError;
use crate::matcher::Candidate;
use crate::resolver::{NoopResolver, OriginResolver};
use crate::store::DecisionStore;
use crate::telemetry::{self, EvaluationTimer};
use std::net::IpAddr;
use std::sync::Arc;
use tracing::debug;

/// Admit or deny.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Allow,
    Deny,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Allow => "allow",
            Action::Deny => "deny",
        }
    }
}

/// Outcome of one evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub action: Action,
    /// The decision that caused a deny.
    pub matched: Option<Arc<Decision>>,
}

impl Verdict {
    pub fn allow() -> Self {
        Self {
            action: Action::Allow,
            matched: None,
        }
    }

    pub fn deny(decision: Arc<Decision>) -> Self {
        Self {
            action: Action::Deny,
            matched: Some(decision),
        }
    }

    pub fn is_denied(&self) -> bool {
        self.action == Action::Deny
    }
}

/// Stateless evaluator over a shared store.
pub struct EnforcementGate {
    store: Arc<DecisionStore>,
    resolver: Arc<dyn OriginResolver>,
    country_enabled: bool,
    as_enabled: bool,
}

impl EnforcementGate {
    /// Gate enforcing only the address scopes.
    pub fn new(store: Arc<DecisionStore>) -> Self {
        Self {
            store,
            resolver: Arc::new(NoopResolver),
            country_enabled: false,
            as_enabled: false,
        }
    }

    /// Enable the geo scopes backed by `resolver`.
    pub fn with_geo_scopes(
        mut self,
        resolver: Arc<dyn OriginResolver>,
        country_enabled: bool,
        as_enabled: bool,
    ) -> Self {
        self.resolver = resolver;
        self.country_enabled = country_enabled;
        self.as_enabled = as_enabled;
        self
    }

    pub fn store(&self) -> &Arc<DecisionStore> {
        &self.store
    }

    /// Evaluate a client address.
    pub fn evaluate(&self, addr: IpAddr) -> Verdict {
        let addr = addr.to_canonical();
        let span = telemetry::spans::evaluate(&addr);
        let _enter = span.enter();
        let _timer = EvaluationTimer::new();

        for scope in Scope::PRECEDENCE {
            // Geo attributes are resolved lazily, only when their scope is reached.
            let candidate = match scope {
                Scope::Ip | Scope::Range => Some(Candidate::Addr(addr)),
                Scope::Country if self.country_enabled => {
                    self.resolver.country(addr).map(Candidate::Country)
                }
                Scope::As if self.as_enabled => self.resolver.asn(addr).map(Candidate::As),
                _ => None,
            };
            let Some(candidate) = candidate else {
                continue;
            };

            if let Some(decision) = self.store.query(scope, &candidate) {
                debug!(
                    client = %addr,
                    scope = %scope,
                    id = %decision.id,
                    value = %decision.target,
                    kind = %decision.kind,
                    "Request denied"
                );
                return Verdict::deny(decision);
            }
        }

        Verdict::allow()
    }

    /// Evaluate a client address given in string form.
    pub fn evaluate_str(&self, addr: &str) -> Result<Verdict, GateError> {
        let addr: IpAddr = addr
            .trim()
            .parse()
            .map_err(|_| GateError::InvalidAddress(addr.to_string()))?;
        Ok(self.evaluate(addr))
    }
}
