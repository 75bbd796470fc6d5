//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::Config;
use reqwest::Url;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("lapi.url is not a valid http(s) URL: {0}")]
    InvalidLapiUrl(String),
    #[error("lapi.api_key is required")]
    MissingApiKey,
    #[error("{0} must be greater than zero")]
    ZeroInterval(&'static str),
    #[error("lapi.max_backoff_secs ({max}) is lower than lapi.initial_backoff_secs ({initial})")]
    BackoffOrder { initial: u64, max: u64 },
    #[error("{0}.database_path is required when {0} is enabled")]
    MissingDatabasePath(&'static str),
    #[error("{section}.database_path does not exist: {path}")]
    DatabaseNotFound { section: &'static str, path: String },
    #[error("ban.template_path does not exist: {0}")]
    TemplateNotFound(String),
    #[error("http.trusted_forward_header is empty")]
    EmptyForwardHeader,
}

impl ValidationError {
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidLapiUrl(_) => "invalid_lapi_url",
            Self::MissingApiKey => "missing_api_key",
            Self::ZeroInterval(_) => "zero_interval",
            Self::BackoffOrder { .. } => "backoff_order",
            Self::MissingDatabasePath(_) => "missing_database_path",
            Self::DatabaseNotFound { .. } => "database_not_found",
            Self::TemplateNotFound(_) => "template_not_found",
            Self::EmptyForwardHeader => "empty_forward_header",
        }
    }
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    // LAPI
    let lapi = &config.lapi;
    match Url::parse(&lapi.url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        _ => errors.push(ValidationError::InvalidLapiUrl(lapi.url.clone())),
    }
    if lapi.api_key.trim().is_empty() {
        errors.push(ValidationError::MissingApiKey);
    }

    let intervals = [
        ("lapi.poll_interval_secs", lapi.poll_interval_secs),
        ("lapi.request_timeout_secs", lapi.request_timeout_secs),
        ("lapi.initial_backoff_secs", lapi.initial_backoff_secs),
        ("store.sweep_interval_secs", config.store.sweep_interval_secs),
    ];
    for (name, value) in intervals {
        if value == 0 {
            errors.push(ValidationError::ZeroInterval(name));
        }
    }
    if lapi.max_backoff_secs < lapi.initial_backoff_secs {
        errors.push(ValidationError::BackoffOrder {
            initial: lapi.initial_backoff_secs,
            max: lapi.max_backoff_secs,
        });
    }

    // Geo scopes
    let geo = [
        ("country_remediations", &config.country_remediations),
        ("as_remediations", &config.as_remediations),
    ];
    for (section, scope) in geo {
        if !scope.enabled {
            continue;
        }
        match &scope.database_path {
            None => errors.push(ValidationError::MissingDatabasePath(section)),
            Some(path) if !path.exists() => errors.push(ValidationError::DatabaseNotFound {
                section,
                path: path.display().to_string(),
            }),
            Some(_) => {}
        }
    }

    // Remediation pages
    if let Some(path) = &config.ban.template_path
        && !path.exists()
    {
        errors.push(ValidationError::TemplateNotFound(path.display().to_string()));
    }

    if config.http.trusted_forward_header.trim().is_empty() {
        errors.push(ValidationError::EmptyForwardHeader);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn minimal_valid_config() -> String {
        r#"
[lapi]
url = "http://127.0.0.1:8080/"
api_key = "secret"
"#
        .to_string()
    }

    #[test]
    fn test_valid_config_passes() {
        let config: Config = toml::from_str(&minimal_valid_config()).unwrap();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_bad_lapi_settings_fail() {
        let toml = r#"
[lapi]
url = "lapi.local:8080"
api_key = "  "
poll_interval_secs = 0
initial_backoff_secs = 30
max_backoff_secs = 10
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let errors = validate(&config).unwrap_err();

        assert!(errors.iter().any(|e| matches!(e, ValidationError::InvalidLapiUrl(_))));
        assert!(errors.contains(&ValidationError::MissingApiKey));
        assert!(errors.contains(&ValidationError::ZeroInterval("lapi.poll_interval_secs")));
        assert!(errors.contains(&ValidationError::BackoffOrder { initial: 30, max: 10 }));
        assert_eq!(errors.len(), 4);
    }

    #[test]
    fn test_enabled_geo_scope_needs_database() {
        let toml = format!(
            "{}\n[country_remediations]\nenabled = true\n\n[as_remediations]\nenabled = true\ndatabase_path = \"/nonexistent/asn.json\"\n",
            minimal_valid_config()
        );
        let config: Config = toml::from_str(&toml).unwrap();
        let errors = validate(&config).unwrap_err();

        assert!(errors.contains(&ValidationError::MissingDatabasePath("country_remediations")));
        assert!(errors.iter().any(|e| e.error_code() == "database_not_found"));
    }

    #[test]
    fn test_existing_database_passes() {
        let table = NamedTempFile::new().unwrap();
        let toml = format!(
            "{}\n[as_remediations]\nenabled = true\ndatabase_path = {:?}\n",
            minimal_valid_config(),
            table.path().display().to_string()
        );
        let config: Config = toml::from_str(&toml).unwrap();
        assert!(validate(&config).is_ok());
    }
}
