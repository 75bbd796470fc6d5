//! Request-origin resolution.
//!
//! Maps a client address to the attributes the `country` and `as` scopes
//! match against. Lookups are local and synchronous; the gate calls them on
//! the request path only when a geo scope is enabled and reached.

mod cache;
mod table;

pub use cache::CachedResolver;
pub use table::{AsnTable, AsnEntry, CountryEntry, CountryTable, TableResolver};

use std::net::IpAddr;

/// Source of country and AS attributes for an address.
pub trait OriginResolver: Send + Sync {
    /// ISO 3166 alpha-2 country code, upper-case.
    fn country(&self, addr: IpAddr) -> Option<String>;

    /// Autonomous system number.
    fn asn(&self, addr: IpAddr) -> Option<u32>;
}

/// Resolver that knows nothing. Used when no geo scope is enabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopResolver;

impl OriginResolver for NoopResolver {
    fn country(&self, _addr: IpAddr) -> Option<String> {
        None
    }

    fn asn(&self, _addr: IpAddr) -> Option<u32> {
        None
    }
}

impl<R: OriginResolver + ?Sized> OriginResolver for std::sync::Arc<R> {
    fn country(&self, addr: IpAddr) -> Option<String> {
        (**self).country(addr)
    }

    fn asn(&self, addr: IpAddr) -> Option<u32> {
        (**self).asn(addr)
    }
}
