//! Decision data model.
//!
//! A [`Decision`] is an authority-issued directive scoped to an address, a
//! CIDR range, a country, or an autonomous system. Decisions arrive from the
//! wire as loosely typed [`RawDecision`]s and are validated into the closed
//! [`Target`] representation before they reach the store.

mod duration;

pub use duration::parse_ttl;

use crate::error::DecisionError;
use chrono::{DateTime, Utc};
use ipnet::{IpNet, Ipv4Net};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use std::time::Duration;

/// Type used when a decision omits its `type` field.
const DEFAULT_DECISION_TYPE: &str = "ban";

/// Origin used when a decision omits its `origin` field.
const UNKNOWN_ORIGIN: &str = "unknown";

/// Opaque decision identifier, unique among active decisions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DecisionId(String);

impl DecisionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DecisionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for DecisionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for DecisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The dimension a decision matches against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Ip,
    Range,
    Country,
    As,
}

impl Scope {
    /// Evaluation order used by the gate. Earlier scopes are more specific.
    pub const PRECEDENCE: [Scope; 4] = [Scope::Ip, Scope::Range, Scope::Country, Scope::As];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Ip => "ip",
            Scope::Range => "range",
            Scope::Country => "country",
            Scope::As => "as",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = DecisionError;

    /// Scopes are matched case-insensitively; LAPI sends `Ip`, `Range`, `AS`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ip" => Ok(Scope::Ip),
            "range" => Ok(Scope::Range),
            "country" => Ok(Scope::Country),
            "as" => Ok(Scope::As),
            _ => Err(DecisionError::UnknownScope(s.to_string())),
        }
    }
}

/// A validated scope together with its value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    /// A single address, canonicalized (IPv4-mapped IPv6 becomes IPv4).
    Ip(IpAddr),
    /// A CIDR block with host bits cleared.
    Range(IpNet),
    /// Upper-case ISO 3166 alpha-2 code.
    Country(String),
    /// Autonomous system number.
    As(u32),
}

impl Target {
    /// Parse a raw `value` for the given scope.
    pub fn parse(scope: Scope, value: &str) -> Result<Self, DecisionError> {
        let value = value.trim();
        let invalid = || DecisionError::InvalidValue {
            scope,
            value: value.to_string(),
        };

        match scope {
            Scope::Ip => value
                .parse::<IpAddr>()
                .map(|ip| Target::Ip(ip.to_canonical()))
                .map_err(|_| invalid()),
            Scope::Range => value
                .parse::<IpNet>()
                .map(|net| Target::Range(canonical_net(net)))
                .map_err(|_| invalid()),
            Scope::Country => {
                if value.len() == 2 && value.bytes().all(|b| b.is_ascii_alphabetic()) {
                    Ok(Target::Country(value.to_ascii_uppercase()))
                } else {
                    Err(invalid())
                }
            }
            Scope::As => {
                let digits = match value.get(..2) {
                    Some(prefix) if prefix.eq_ignore_ascii_case("as") => &value[2..],
                    _ => value,
                };
                digits.parse::<u32>().map(Target::As).map_err(|_| invalid())
            }
        }
    }

    pub fn scope(&self) -> Scope {
        match self {
            Target::Ip(_) => Scope::Ip,
            Target::Range(_) => Scope::Range,
            Target::Country(_) => Scope::Country,
            Target::As(_) => Scope::As,
        }
    }
}

/// Host bits cleared; a block inside `::ffff:0:0/96` becomes the IPv4 block
/// it maps, so it lands where canonical candidates are looked up.
pub fn canonical_net(net: IpNet) -> IpNet {
    match net {
        IpNet::V6(v6) if v6.prefix_len() >= 96 => v6
            .addr()
            .to_ipv4_mapped()
            .and_then(|v4| Ipv4Net::new(v4, v6.prefix_len() - 96).ok())
            .map(|v4| IpNet::V4(v4.trunc()))
            .unwrap_or_else(|| net.trunc()),
        _ => net.trunc(),
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Ip(ip) => write!(f, "{}", ip),
            Target::Range(net) => write!(f, "{}", net),
            Target::Country(code) => f.write_str(code),
            Target::As(asn) => write!(f, "{}", asn),
        }
    }
}

/// What the authority wants done to matching clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecisionType {
    Ban,
    Captcha,
    /// Any other type, lower-cased.
    Other(String),
}

impl DecisionType {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "ban" => DecisionType::Ban,
            "captcha" => DecisionType::Captcha,
            other => DecisionType::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            DecisionType::Ban => "ban",
            DecisionType::Captcha => "captcha",
            DecisionType::Other(s) => s,
        }
    }
}

impl fmt::Display for DecisionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated, active-or-expired decision as held by the store.
///
/// Immutable: an update from the authority replaces the whole value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub id: DecisionId,
    pub origin: String,
    pub kind: DecisionType,
    pub target: Target,
    pub scenario: Option<String>,
    /// TTL as received.
    pub duration: Duration,
    /// Absolute expiry, fixed at insertion.
    pub expires_at: DateTime<Utc>,
}

impl Decision {
    /// Validate a wire decision, anchoring its TTL at `now`.
    pub fn from_raw(raw: &RawDecision, now: DateTime<Utc>) -> Result<Self, DecisionError> {
        let id = raw.id.as_ref().ok_or(DecisionError::MissingField("id"))?;
        let scope: Scope = raw
            .scope
            .as_deref()
            .ok_or(DecisionError::MissingField("scope"))?
            .parse()?;
        let value = raw.value.as_deref().ok_or(DecisionError::MissingField("value"))?;
        let target = Target::parse(scope, value)?;

        let duration_str = raw
            .duration
            .as_deref()
            .ok_or(DecisionError::MissingField("duration"))?;
        let duration = parse_ttl(duration_str)?;
        let expires_at = chrono::Duration::from_std(duration)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| DecisionError::InvalidDuration(duration_str.to_string()))?;

        Ok(Self {
            id: id.to_decision_id(),
            origin: raw
                .origin
                .as_deref()
                .map(|o| o.trim().to_ascii_lowercase())
                .unwrap_or_else(|| UNKNOWN_ORIGIN.to_string()),
            kind: DecisionType::parse(raw.kind.as_deref().unwrap_or(DEFAULT_DECISION_TYPE)),
            target,
            scenario: raw.scenario.clone(),
            duration,
            expires_at,
        })
    }

    pub fn scope(&self) -> Scope {
        self.target.scope()
    }

    /// Active iff `now < expires_at`.
    #[inline]
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Identifier as it appears on the wire: LAPI uses integers, other
/// producers use strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireId {
    Number(u64),
    Text(String),
}

impl WireId {
    pub fn to_decision_id(&self) -> DecisionId {
        match self {
            WireId::Number(n) => DecisionId(n.to_string()),
            WireId::Text(s) => DecisionId(s.clone()),
        }
    }
}

/// A decision exactly as the authority sent it. Every field is optional so a
/// single malformed entry fails validation instead of the whole response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawDecision {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<WireId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario: Option<String>,
}

impl RawDecision {
    /// Convenience constructor for the common fields.
    pub fn new(id: &str, scope: &str, value: &str, duration: &str) -> Self {
        Self {
            id: Some(WireId::Text(id.to_string())),
            scope: Some(scope.to_string()),
            value: Some(value.to_string()),
            duration: Some(duration.to_string()),
            ..Self::default()
        }
    }

    pub fn with_type(mut self, kind: &str) -> Self {
        self.kind = Some(kind.to_string());
        self
    }

    pub fn with_origin(mut self, origin: &str) -> Self {
        self.origin = Some(origin.to_string());
        self
    }
}
