//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Config struct definitions and loading
//! - [`defaults`]: serde default functions
//! - [`validation`]: startup checks collecting every problem at once

mod defaults;
mod types;
mod validation;

pub use types::{
    BanConfig, CaptchaConfig, Config, ConfigError, GeoScopeConfig, HttpConfig, LapiConfig,
    ResolverConfig, StoreConfig,
};
pub use validation::{ValidationError, validate};

/// Config path used when none is given on the command line.
pub const DEFAULT_CONFIG_PATH: &str = "lapi-gate.toml";
