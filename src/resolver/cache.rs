//! TTL cache in front of an [`OriginResolver`].

use super::OriginResolver;
use dashmap::DashMap;
use std::net::IpAddr;
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone)]
struct CachedOrigin {
    country: Option<String>,
    asn: Option<u32>,
    expires_at: Instant,
}

/// Caches both attributes of an address together, negative results included.
pub struct CachedResolver<R> {
    inner: R,
    cache: DashMap<IpAddr, CachedOrigin>,
    ttl: Duration,
    max_size: usize,
}

impl<R: OriginResolver> CachedResolver<R> {
    pub fn new(inner: R, ttl: Duration, max_size: usize) -> Self {
        Self {
            inner,
            cache: DashMap::new(),
            ttl,
            max_size,
        }
    }

    fn lookup(&self, addr: IpAddr) -> CachedOrigin {
        let addr = addr.to_canonical();
        let now = Instant::now();

        if let Some(cached) = self.cache.get(&addr)
            && cached.expires_at > now
        {
            return cached.clone();
        }

        let origin = CachedOrigin {
            country: self.inner.country(addr),
            asn: self.inner.asn(addr),
            expires_at: now + self.ttl,
        };
        self.cache.insert(addr, origin.clone());

        if self.cache.len() > self.max_size {
            self.prune();
        }

        origin
    }

    /// Drop expired entries; if still over capacity, clear everything.
    fn prune(&self) {
        let now = Instant::now();
        self.cache.retain(|_, v| v.expires_at > now);
        if self.cache.len() > self.max_size {
            self.cache.clear();
        }
        debug!(size = self.cache.len(), "Pruned origin cache");
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

impl<R: OriginResolver> OriginResolver for CachedResolver<R> {
    fn country(&self, addr: IpAddr) -> Option<String> {
        self.lookup(addr).country
    }

    fn asn(&self, addr: IpAddr) -> Option<u32> {
        self.lookup(addr).asn
    }
}
