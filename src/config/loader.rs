//! Configuration loading from disk and environment.
//!
//! Precedence, lowest to highest: built-in defaults, TOML file, environment
//! variables. The environment layer uses language-neutral names so the same
//! deployment manifests work across gateway implementations.

use std::fs;
use std::path::Path;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", format_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn format_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load a configuration file, apply environment overrides, and validate.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let mut config: GatewayConfig = toml::from_str(&content)?;

    apply_env_overrides(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Build a configuration from defaults plus environment overrides.
pub fn load_from_env() -> Result<GatewayConfig, ConfigError> {
    let mut config = GatewayConfig::default();
    apply_env_overrides(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Apply environment variable overrides to a loaded configuration.
pub fn apply_env_overrides(config: &mut GatewayConfig) {
    apply_overrides(config, |name| std::env::var(name).ok());
}

/// Apply overrides from an arbitrary lookup. Unparseable values are logged
/// and skipped rather than aborting startup.
pub fn apply_overrides<F>(config: &mut GatewayConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(port) = parsed(&lookup, "GATEWAY_PORT") {
        let host = config
            .listener
            .bind_address
            .rsplit_once(':')
            .map(|(host, _)| host.to_string())
            .unwrap_or_else(|| "0.0.0.0".to_string());
        config.listener.bind_address = format!("{}:{}", host, port as u16);
    }

    if let Some(secret) = lookup("JWT_SECRET") {
        config.auth.jwt_secret = secret;
    }
    if let Some(origin) = lookup("ALLOWED_ORIGIN") {
        config.cors.allowed_origin = origin;
    }

    if let Some(n) = parsed(&lookup, "RATE_LIMIT_MAX_REQUESTS") {
        config.rate_limit.max_requests = n as u32;
    }
    if let Some(n) = parsed(&lookup, "RATE_LIMIT_WINDOW_SECS") {
        config.rate_limit.window_secs = n;
    }

    if let Some(n) = parsed(&lookup, "CB_FAILURE_THRESHOLD") {
        config.circuit_breaker.failure_threshold = n as u32;
    }
    if let Some(n) = parsed(&lookup, "CB_RESET_TIMEOUT_SECS") {
        config.circuit_breaker.reset_timeout_secs = n;
    }

    if let Some(n) = parsed(&lookup, "RETRY_MAX_ATTEMPTS") {
        config.retries.max_attempts = n as u32;
    }
    if let Some(n) = parsed(&lookup, "UPSTREAM_TIMEOUT_SECS") {
        config.upstream.timeout_secs = n;
    }

    // One base-address variable per registered service, e.g. LISTING_SERVICE_URL.
    for service in &mut config.services {
        let var = format!("{}_SERVICE_URL", service.name.to_uppercase().replace('-', "_"));
        if let Some(url) = lookup(&var) {
            service.url = Some(url);
        }
    }
}

fn parsed<F>(lookup: &F, name: &str) -> Option<u64>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(name)?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(var = name, value = %raw, "Ignoring unparseable override");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from<'a>(map: &'a HashMap<&'a str, &'a str>) -> impl Fn(&str) -> Option<String> + 'a {
        move |name| map.get(name).map(|v| v.to_string())
    }

    #[test]
    fn overrides_port_and_secret() {
        let mut config = GatewayConfig::default();
        let vars = HashMap::from([("GATEWAY_PORT", "9999"), ("JWT_SECRET", "s3cret")]);

        apply_overrides(&mut config, lookup_from(&vars));

        assert_eq!(config.listener.bind_address, "0.0.0.0:9999");
        assert_eq!(config.auth.jwt_secret, "s3cret");
    }

    #[test]
    fn overrides_per_service_url() {
        let mut config = GatewayConfig::default();
        let vars = HashMap::from([("LISTING_SERVICE_URL", "http://listing.internal:8000")]);

        apply_overrides(&mut config, lookup_from(&vars));

        let listing = config.services.iter().find(|s| s.name == "listing").unwrap();
        assert_eq!(listing.url.as_deref(), Some("http://listing.internal:8000"));
        let valuation = config.services.iter().find(|s| s.name == "valuation").unwrap();
        assert_eq!(valuation.url.as_deref(), Some("http://127.0.0.1:3003"));
    }

    #[test]
    fn skips_unparseable_numbers() {
        let mut config = GatewayConfig::default();
        let before = config.rate_limit.max_requests;
        let vars = HashMap::from([("RATE_LIMIT_MAX_REQUESTS", "not-a-number")]);

        apply_overrides(&mut config, lookup_from(&vars));

        assert_eq!(config.rate_limit.max_requests, before);
    }

    #[test]
    fn parses_minimal_toml() {
        let raw = r#"
            [listener]
            bind_address = "127.0.0.1:8088"

            [[services]]
            name = "identity"

            [[services]]
            name = "listing"
            url = "http://listing:4000"
        "#;
        let config: GatewayConfig = toml::from_str(raw).unwrap();

        assert_eq!(config.listener.bind_address, "127.0.0.1:8088");
        assert_eq!(config.services.len(), 2);
        assert!(config.services[0].url.is_none());
        assert_eq!(config.circuit_breaker.failure_threshold, 5);
    }
}
