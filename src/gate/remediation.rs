//! Mapping verdicts to the remediation the proxy applies.

use super::Verdict;
use crate::config::Config;
use crate::decision::DecisionType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What the proxy does with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Remediation {
    Pass,
    Ban,
    Captcha,
}

impl Remediation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Remediation::Pass => "pass",
            Remediation::Ban => "ban",
            Remediation::Captcha => "captcha",
        }
    }
}

impl fmt::Display for Remediation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which remediations this agent applies, and what to do with unknown types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemediationPolicy {
    pub ban_enabled: bool,
    pub captcha_enabled: bool,
    pub fallback: Remediation,
}

impl Default for RemediationPolicy {
    fn default() -> Self {
        Self {
            ban_enabled: true,
            captcha_enabled: true,
            fallback: Remediation::Ban,
        }
    }
}

impl RemediationPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            ban_enabled: config.ban.enabled,
            captcha_enabled: config.captcha.enabled,
            fallback: config.fallback_remediation,
        }
    }

    /// Remediation for a verdict. A disabled remediation passes the request.
    pub fn remediation(&self, verdict: &Verdict) -> Remediation {
        let Some(decision) = &verdict.matched else {
            return Remediation::Pass;
        };
        let wanted = match &decision.kind {
            DecisionType::Ban => Remediation::Ban,
            DecisionType::Captcha => Remediation::Captcha,
            DecisionType::Other(_) => self.fallback,
        };
        match wanted {
            Remediation::Ban if !self.ban_enabled => Remediation::Pass,
            Remediation::Captcha if !self.captcha_enabled => Remediation::Pass,
            other => other,
        }
    }
}
