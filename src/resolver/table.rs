//! Network-table resolver.
//!
//! Country and AS attributes come from JSON tables of CIDR blocks:
//!
//! ```json
//! { "networks": [ { "network": "127.0.0.1/32", "country": "US" } ] }
//! { "networks": [ { "network": "127.0.0.0/8", "asn": 12300, "organization": "acme" } ] }
//! ```
//!
//! A bare address in `network` is treated as a host block. When blocks
//! overlap, the most specific one wins.

use super::OriginResolver;
use crate::decision::canonical_net;
use crate::error::ResolveError;
use crate::prefix_trie::NetworkTrie;
use ipnet::IpNet;
use serde::Deserialize;
use std::fs;
use std::net::IpAddr;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CountryEntry {
    pub network: String,
    pub country: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AsnEntry {
    pub network: String,
    pub asn: u32,
    #[serde(default)]
    pub organization: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CountryTable {
    #[serde(default)]
    pub networks: Vec<CountryEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AsnTable {
    #[serde(default)]
    pub networks: Vec<AsnEntry>,
}

/// Longest-prefix resolver over in-memory country and AS tables.
#[derive(Debug, Default)]
pub struct TableResolver {
    countries: NetworkTrie<String>,
    asns: NetworkTrie<u32>,
}

impl TableResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a block to a country code.
    pub fn add_country(&mut self, network: IpNet, country: &str) {
        self.countries
            .insert(canonical_net(network), country.trim().to_ascii_uppercase());
    }

    /// Map a block to an AS number.
    pub fn add_asn(&mut self, network: IpNet, asn: u32) {
        self.asns.insert(canonical_net(network), asn);
    }

    /// Load a country table from a JSON file, adding to what is held.
    pub fn load_countries(&mut self, path: &Path) -> Result<usize, ResolveError> {
        let table: CountryTable = read_table(path)?;
        for entry in &table.networks {
            let network = parse_network(path, &entry.network)?;
            self.add_country(network, &entry.country);
        }
        info!(path = %path.display(), networks = table.networks.len(), "Loaded country table");
        Ok(table.networks.len())
    }

    /// Load an AS table from a JSON file, adding to what is held.
    pub fn load_asns(&mut self, path: &Path) -> Result<usize, ResolveError> {
        let table: AsnTable = read_table(path)?;
        for entry in &table.networks {
            let network = parse_network(path, &entry.network)?;
            self.add_asn(network, entry.asn);
        }
        info!(path = %path.display(), networks = table.networks.len(), "Loaded AS table");
        Ok(table.networks.len())
    }

    pub fn country_networks(&self) -> usize {
        self.countries.len()
    }

    pub fn asn_networks(&self) -> usize {
        self.asns.len()
    }
}

impl OriginResolver for TableResolver {
    fn country(&self, addr: IpAddr) -> Option<String> {
        self.countries.longest_match(addr.to_canonical()).cloned()
    }

    fn asn(&self, addr: IpAddr) -> Option<u32> {
        self.asns.longest_match(addr.to_canonical()).copied()
    }
}

fn read_table<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, ResolveError> {
    let content = fs::read_to_string(path).map_err(|source| ResolveError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| ResolveError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_network(path: &Path, network: &str) -> Result<IpNet, ResolveError> {
    let network = network.trim();
    network
        .parse::<IpNet>()
        .or_else(|_| network.parse::<IpAddr>().map(IpNet::from))
        .map_err(|_| ResolveError::InvalidNetwork {
            path: path.to_path_buf(),
            network: network.to_string(),
        })
}
