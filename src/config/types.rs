//! Core configuration types and loading.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use super::defaults::*;
use crate::gate::Remediation;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

impl ConfigError {
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::Parse(_) => "parse",
        }
    }
}

/// Agent configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Authority connection.
    pub lapi: LapiConfig,
    /// Decision store maintenance.
    #[serde(default)]
    pub store: StoreConfig,
    /// Ban remediation.
    #[serde(default)]
    pub ban: BanConfig,
    /// Captcha remediation.
    #[serde(default)]
    pub captcha: CaptchaConfig,
    /// Country-scoped decisions.
    #[serde(default)]
    pub country_remediations: GeoScopeConfig,
    /// AS-scoped decisions.
    #[serde(default)]
    pub as_remediations: GeoScopeConfig,
    /// Origin lookup cache.
    #[serde(default)]
    pub resolver: ResolverConfig,
    /// Forward-auth and metrics listener.
    #[serde(default)]
    pub http: HttpConfig,
    /// Remediation for decision types this agent does not know.
    #[serde(default = "default_fallback_remediation")]
    pub fallback_remediation: Remediation,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

/// LAPI connection and stream filters.
#[derive(Debug, Clone, Deserialize)]
pub struct LapiConfig {
    /// Base URL, e.g. `http://127.0.0.1:8080/`.
    pub url: String,
    /// Bouncer API key, sent as `X-Api-Key`.
    pub api_key: String,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_secs: u64,
    #[serde(default = "default_max_backoff")]
    pub max_backoff_secs: u64,
    /// Only decisions whose scenario contains one of these.
    #[serde(default)]
    pub include_scenarios_containing: Vec<String>,
    /// Drop decisions whose scenario contains one of these.
    #[serde(default)]
    pub exclude_scenarios_containing: Vec<String>,
    /// Only decisions from these origins (`cscli`, `crowdsec`, `CAPI`, ...).
    #[serde(default)]
    pub only_include_decisions_from: Vec<String>,
}

impl LapiConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_secs(self.initial_backoff_secs)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_secs)
    }
}

impl Default for LapiConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: String::new(),
            poll_interval_secs: default_poll_interval(),
            request_timeout_secs: default_request_timeout(),
            initial_backoff_secs: default_initial_backoff(),
            max_backoff_secs: default_max_backoff(),
            include_scenarios_containing: Vec::new(),
            exclude_scenarios_containing: Vec::new(),
            only_include_decisions_from: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Seconds between expired-decision sweeps (default: 60).
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BanConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// HTML page served with 403 responses. A built-in page is used if unset.
    #[serde(default)]
    pub template_path: Option<PathBuf>,
}

impl Default for BanConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            template_path: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptchaConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for CaptchaConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// A geo scope (`country` or `as`) and the network table backing it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeoScopeConfig {
    #[serde(default)]
    pub enabled: bool,
    /// JSON network table, required when enabled.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResolverConfig {
    #[serde(default = "default_resolver_cache_ttl")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_resolver_cache_max_size")]
    pub cache_max_size: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_resolver_cache_ttl(),
            cache_max_size: default_resolver_cache_max_size(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_listen")]
    pub listen: SocketAddr,
    /// Header the fronting proxy sets to the real client address.
    #[serde(default = "default_forward_header")]
    pub trusted_forward_header: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen: default_http_listen(),
            trusted_forward_header: default_forward_header(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_minimal_config_gets_defaults() {
        let config: Config = toml::from_str(
            r#"
[lapi]
url = "http://127.0.0.1:8080/"
api_key = "secret"
"#,
        )
        .unwrap();

        assert_eq!(config.lapi.poll_interval(), Duration::from_secs(10));
        assert_eq!(config.lapi.request_timeout_secs, 5);
        assert_eq!(config.lapi.initial_backoff(), Duration::from_secs(1));
        assert_eq!(config.lapi.max_backoff(), Duration::from_secs(60));
        assert!(config.lapi.exclude_scenarios_containing.is_empty());
        assert_eq!(config.store.sweep_interval_secs, 60);
        assert!(config.ban.enabled);
        assert!(config.captcha.enabled);
        assert!(!config.country_remediations.enabled);
        assert!(!config.as_remediations.enabled);
        assert_eq!(config.resolver.cache_max_size, 100_000);
        assert_eq!(config.http.listen, "127.0.0.1:9100".parse().unwrap());
        assert_eq!(config.http.trusted_forward_header, "X-Real-IP");
        assert_eq!(config.fallback_remediation, Remediation::Ban);
    }

    #[test]
    fn test_full_config() {
        let config: Config = toml::from_str(
            r#"
fallback_remediation = "captcha"

[lapi]
url = "https://lapi.example/"
api_key = "secret"
poll_interval_secs = 2
exclude_scenarios_containing = ["probing"]
only_include_decisions_from = ["cscli", "crowdsec"]

[ban]
enabled = false
template_path = "/etc/lapi-gate/ban.html"

[country_remediations]
enabled = true
database_path = "/var/lib/lapi-gate/countries.json"

[http]
listen = "0.0.0.0:8081"
trusted_forward_header = "X-Forwarded-For"
"#,
        )
        .unwrap();

        assert_eq!(config.fallback_remediation, Remediation::Captcha);
        assert_eq!(config.lapi.poll_interval_secs, 2);
        assert_eq!(config.lapi.only_include_decisions_from, vec!["cscli", "crowdsec"]);
        assert!(!config.ban.enabled);
        assert_eq!(
            config.ban.template_path.as_deref(),
            Some(Path::new("/etc/lapi-gate/ban.html"))
        );
        assert!(config.country_remediations.enabled);
        assert_eq!(config.http.listen.port(), 8081);
    }

    #[test]
    fn test_missing_lapi_section_fails() {
        assert!(toml::from_str::<Config>("[ban]\nenabled = true\n").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[lapi]\nurl = \"http://localhost:8080/\"\napi_key = \"k\"").unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.lapi.api_key, "k");

        let err = Config::load("/nonexistent/lapi-gate.toml").unwrap_err();
        assert_eq!(err.error_code(), "io");
    }
}
