//! Scope matching predicates.
//!
//! Pure functions deciding whether one request-origin attribute matches a
//! decision target. The store uses its indexes to find candidate decisions
//! and confirms each hit with [`matches`].

use crate::decision::{Scope, Target};
use ipnet::IpNet;
use std::net::IpAddr;

/// A request-origin attribute to test against decisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidate {
    /// The client address; probes the `ip` and `range` scopes.
    Addr(IpAddr),
    /// Resolved country code; probes the `country` scope.
    Country(String),
    /// Resolved AS number; probes the `as` scope.
    As(u32),
}

impl Candidate {
    /// Canonical form: IPv4-mapped IPv6 addresses become IPv4.
    pub fn canonical(&self) -> Candidate {
        match self {
            Candidate::Addr(ip) => Candidate::Addr(ip.to_canonical()),
            other => other.clone(),
        }
    }

    /// Whether this candidate can match decisions of `scope` at all.
    pub fn probes(&self, scope: Scope) -> bool {
        matches!(
            (self, scope),
            (Candidate::Addr(_), Scope::Ip | Scope::Range)
                | (Candidate::Country(_), Scope::Country)
                | (Candidate::As(_), Scope::As)
        )
    }
}

#[inline]
pub fn ip_matches(decision: &IpAddr, candidate: &IpAddr) -> bool {
    decision.to_canonical() == candidate.to_canonical()
}

/// Containment test; mismatched address families never match.
#[inline]
pub fn range_matches(block: &IpNet, candidate: &IpAddr) -> bool {
    match (block, candidate.to_canonical()) {
        (IpNet::V4(net), IpAddr::V4(addr)) => net.contains(&addr),
        (IpNet::V6(net), IpAddr::V6(addr)) => net.contains(&addr),
        _ => false,
    }
}

#[inline]
pub fn country_matches(decision: &str, candidate: &str) -> bool {
    decision.eq_ignore_ascii_case(candidate.trim())
}

#[inline]
pub fn as_matches(decision: u32, candidate: u32) -> bool {
    decision == candidate
}

/// Dispatch to the predicate for the target's scope.
pub fn matches(target: &Target, candidate: &Candidate) -> bool {
    match (target, candidate) {
        (Target::Ip(ip), Candidate::Addr(addr)) => ip_matches(ip, addr),
        (Target::Range(net), Candidate::Addr(addr)) => range_matches(net, addr),
        (Target::Country(code), Candidate::Country(country)) => country_matches(code, country),
        (Target::As(asn), Candidate::As(candidate)) => as_matches(*asn, *candidate),
        _ => false,
    }
}
