//! In-memory store of active decisions.
//!
//! The store is the local materialized view of what the authority wants
//! enforced. One background task mutates it while every inbound request
//! reads it.
//!
//! # Architecture
//!
//! - **by_id**: `HashMap` of every held decision, the source of truth
//! - **ip / country / as**: equality indexes (value -> decision ids)
//! - **range**: [`NetworkTrie`] over CIDR blocks (block -> decision ids)
//!
//! All indexes sit behind one `parking_lot::RwLock`. A mutation takes the
//! write lock once, so readers see either the state before it or after it,
//! never a partially updated range trie.
//!
//! # Hot Path
//!
//! `query()` takes the read lock, pulls candidate ids from the scope's index,
//! and returns the first one that is still active and confirmed by the
//! scope matcher. Expired entries are skipped lazily; [`sweeper`] evicts
//! them.

pub mod sweeper;

use crate::decision::{Decision, DecisionId, RawDecision, Scope, Target};
use crate::error::DecisionError;
use crate::matcher::{self, Candidate};
use crate::prefix_trie::NetworkTrie;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use std::hash::Hash;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, warn};

pub use sweeper::spawn_sweep_task;

/// Outcome of an [`DecisionStore::insert`] call.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InsertReport {
    /// Decisions stored (new or replacing an entry with the same id).
    pub inserted: usize,
    /// Entries skipped, with the id when one was present.
    pub rejected: Vec<(Option<DecisionId>, DecisionError)>,
}

/// Number of held decisions per scope.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScopeCounts {
    pub ip: usize,
    pub range: usize,
    pub country: usize,
    pub as_: usize,
}

impl ScopeCounts {
    pub fn get(&self, scope: Scope) -> usize {
        match scope {
            Scope::Ip => self.ip,
            Scope::Range => self.range,
            Scope::Country => self.country,
            Scope::As => self.as_,
        }
    }
}

type IdSet = BTreeSet<DecisionId>;

#[derive(Debug, Default)]
struct Indexes {
    by_id: HashMap<DecisionId, Arc<Decision>>,
    ips: HashMap<IpAddr, IdSet>,
    ranges: NetworkTrie<DecisionId>,
    countries: HashMap<String, IdSet>,
    asns: HashMap<u32, IdSet>,
}

impl Indexes {
    fn upsert(&mut self, decision: Decision) -> bool {
        let decision = Arc::new(decision);
        let replaced = match self.by_id.insert(decision.id.clone(), Arc::clone(&decision)) {
            Some(previous) => {
                self.unlink(&previous);
                true
            }
            None => false,
        };
        self.link(&decision);
        replaced
    }

    fn remove(&mut self, id: &DecisionId) -> Option<Arc<Decision>> {
        let removed = self.by_id.remove(id)?;
        self.unlink(&removed);
        Some(removed)
    }

    fn link(&mut self, decision: &Decision) {
        let id = decision.id.clone();
        match &decision.target {
            Target::Ip(ip) => index_add(&mut self.ips, *ip, id),
            Target::Range(net) => {
                self.ranges.insert(*net, id);
            }
            Target::Country(code) => index_add(&mut self.countries, code.clone(), id),
            Target::As(asn) => index_add(&mut self.asns, *asn, id),
        }
    }

    fn unlink(&mut self, decision: &Decision) {
        let id = &decision.id;
        match &decision.target {
            Target::Ip(ip) => index_remove(&mut self.ips, ip, id),
            Target::Range(net) => {
                self.ranges.remove(net, id);
            }
            Target::Country(code) => index_remove(&mut self.countries, code, id),
            Target::As(asn) => index_remove(&mut self.asns, asn, id),
        }
    }

    /// Candidate ids for a probe, most specific first for ranges.
    fn candidates(&self, scope: Scope, candidate: &Candidate) -> Vec<&DecisionId> {
        match (scope, candidate) {
            (Scope::Ip, Candidate::Addr(addr)) => index_get(&self.ips, addr),
            (Scope::Range, Candidate::Addr(addr)) => self.ranges.matches(*addr),
            (Scope::Country, Candidate::Country(code)) => {
                index_get(&self.countries, &code.trim().to_ascii_uppercase())
            }
            (Scope::As, Candidate::As(asn)) => index_get(&self.asns, asn),
            _ => Vec::new(),
        }
    }

    /// Ids of decisions whose target is exactly `target`.
    fn exact(&self, target: &Target) -> Vec<DecisionId> {
        match target {
            Target::Ip(ip) => index_get(&self.ips, ip),
            Target::Range(net) => self.ranges.exact(net).iter().collect(),
            Target::Country(code) => index_get(&self.countries, code),
            Target::As(asn) => index_get(&self.asns, asn),
        }
        .into_iter()
        .cloned()
        .collect()
    }
}

fn index_add<K: Hash + Eq>(index: &mut HashMap<K, IdSet>, key: K, id: DecisionId) {
    index.entry(key).or_default().insert(id);
}

fn index_remove<K: Hash + Eq>(index: &mut HashMap<K, IdSet>, key: &K, id: &DecisionId) {
    if let Some(ids) = index.get_mut(key) {
        ids.remove(id);
        if ids.is_empty() {
            index.remove(key);
        }
    }
}

fn index_get<'a, K: Hash + Eq>(index: &'a HashMap<K, IdSet>, key: &K) -> Vec<&'a DecisionId> {
    index.get(key).map(|ids| ids.iter().collect()).unwrap_or_default()
}

/// Concurrent decision store.
///
/// Owned and injected (`Arc<DecisionStore>`); there is no process-wide
/// instance, so every test builds its own.
#[derive(Debug, Default)]
pub struct DecisionStore {
    inner: RwLock<Indexes>,
}

impl DecisionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert a batch of wire decisions.
    ///
    /// Malformed entries are logged and skipped; the rest of the batch is
    /// still applied.
    pub fn insert<I>(&self, decisions: I) -> InsertReport
    where
        I: IntoIterator<Item = RawDecision>,
    {
        self.insert_at(decisions, Utc::now())
    }

    /// [`insert`](Self::insert) with an explicit clock, anchoring every TTL
    /// at `now`.
    pub fn insert_at<I>(&self, decisions: I, now: DateTime<Utc>) -> InsertReport
    where
        I: IntoIterator<Item = RawDecision>,
    {
        let mut report = InsertReport::default();
        let mut valid = Vec::new();

        // Validate outside the lock.
        for raw in decisions {
            match Decision::from_raw(&raw, now) {
                Ok(decision) => valid.push(decision),
                Err(e) => {
                    let id = raw.id.as_ref().map(|id| id.to_decision_id());
                    if matches!(e, DecisionError::AlreadyExpired(_)) {
                        debug!(id = ?id, error = %e, "Skipping expired decision");
                    } else {
                        warn!(id = ?id, value = ?raw.value, error = %e, "Skipping invalid decision");
                    }
                    report.rejected.push((id, e));
                }
            }
        }

        if valid.is_empty() {
            return report;
        }

        let mut inner = self.inner.write();
        for decision in valid {
            debug!(
                id = %decision.id,
                scope = %decision.scope(),
                value = %decision.target,
                kind = %decision.kind,
                origin = %decision.origin,
                expires_at = %decision.expires_at,
                "Stored decision"
            );
            inner.upsert(decision);
            report.inserted += 1;
        }

        report
    }

    /// Remove the decision with `id`. Returns whether one was removed.
    pub fn delete_by_id(&self, id: &DecisionId) -> bool {
        let removed = self.inner.write().remove(id);
        if let Some(decision) = &removed {
            debug!(id = %id, value = %decision.target, "Deleted decision");
        }
        removed.is_some()
    }

    /// Remove every decision whose scope and value equal the filter,
    /// whatever its id.
    pub fn delete_by_filter(&self, scope: Scope, value: &str) -> Result<usize, DecisionError> {
        let target = Target::parse(scope, value)?;
        Ok(self.delete_matching(&target))
    }

    /// Remove every decision whose target is exactly `target`.
    ///
    /// For ranges this is block equality, not containment.
    pub fn delete_matching(&self, target: &Target) -> usize {
        let mut inner = self.inner.write();
        let ids = inner.exact(target);
        let mut removed = 0;
        for id in &ids {
            if inner.remove(id).is_some() {
                removed += 1;
            }
        }
        if removed > 0 {
            debug!(scope = %target.scope(), value = %target, count = removed, "Deleted decisions by filter");
        }
        removed
    }

    /// Active decision of `scope` matching `candidate`, if any.
    pub fn query(&self, scope: Scope, candidate: &Candidate) -> Option<Arc<Decision>> {
        self.query_at(scope, candidate, Utc::now())
    }

    /// [`query`](Self::query) evaluated at `now`.
    pub fn query_at(
        &self,
        scope: Scope,
        candidate: &Candidate,
        now: DateTime<Utc>,
    ) -> Option<Arc<Decision>> {
        if !candidate.probes(scope) {
            return None;
        }
        let candidate = candidate.canonical();

        let inner = self.inner.read();
        inner
            .candidates(scope, &candidate)
            .into_iter()
            .filter_map(|id| inner.by_id.get(id))
            .find(|d| d.is_active_at(now) && matcher::matches(&d.target, &candidate))
            .cloned()
    }

    /// Evict every decision with `now >= expires_at`. Returns the count.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Utc::now())
    }

    pub fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        // Only take the write lock when there is something to evict.
        if self.inner.read().by_id.values().all(|d| d.is_active_at(now)) {
            return 0;
        }

        let mut inner = self.inner.write();
        let expired: Vec<DecisionId> = inner
            .by_id
            .values()
            .filter(|d| !d.is_active_at(now))
            .map(|d| d.id.clone())
            .collect();
        for id in &expired {
            inner.remove(id);
        }

        if !expired.is_empty() {
            debug!(count = expired.len(), "Swept expired decisions");
        }
        expired.len()
    }

    /// Held decision by id, active or not.
    pub fn get(&self, id: &DecisionId) -> Option<Arc<Decision>> {
        self.inner.read().by_id.get(id).cloned()
    }

    /// Number of held decisions (expired but unswept ones included).
    pub fn len(&self) -> usize {
        self.inner.read().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().by_id.is_empty()
    }

    pub fn counts(&self) -> ScopeCounts {
        let inner = self.inner.read();
        let mut counts = ScopeCounts::default();
        for decision in inner.by_id.values() {
            match decision.scope() {
                Scope::Ip => counts.ip += 1,
                Scope::Range => counts.range += 1,
                Scope::Country => counts.country += 1,
                Scope::As => counts.as_ += 1,
            }
        }
        counts
    }

    /// Active decisions, ordered by id.
    pub fn snapshot(&self) -> Vec<Arc<Decision>> {
        let now = Utc::now();
        let inner = self.inner.read();
        let mut active: Vec<Arc<Decision>> = inner
            .by_id
            .values()
            .filter(|d| d.is_active_at(now))
            .cloned()
            .collect();
        active.sort_by(|a, b| a.id.cmp(&b.id));
        active
    }
}
