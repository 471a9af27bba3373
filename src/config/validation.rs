//! Configuration validation.
//!
//! Serde handles syntactic checks; this module covers the semantic ones:
//! value ranges, referential integrity between gated services, features,
//! and the service list. All errors are collected and reported together
//! rather than stopping at the first.

use url::Url;

use crate::config::schema::GatewayConfig;

/// A single semantic validation failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("no services configured")]
    NoServices,

    #[error("duplicate service name '{0}'")]
    DuplicateService(String),

    #[error("service '{0}' has an invalid url: {1}")]
    InvalidServiceUrl(String, String),

    #[error("default_service_url is invalid: {0}")]
    InvalidDefaultUrl(String),

    #[error("rollout_percentage for feature '{0}' is {1}, must be 0..=100")]
    RolloutOutOfRange(String, u8),

    #[error("gated service '{0}' is not a registered service")]
    GatedServiceUnknown(String),

    #[error("gated service '{0}' references unknown feature '{1}'")]
    GatedFeatureUnknown(String, String),

    #[error("rate_limit.max_requests must be at least 1")]
    ZeroRateBudget,

    #[error("rate_limit.window_secs must be at least 1")]
    ZeroRateWindow,

    #[error("circuit_breaker.failure_threshold must be at least 1")]
    ZeroFailureThreshold,

    #[error("retries.max_attempts must be at least 1")]
    ZeroRetryAttempts,

    #[error("upstream.timeout_secs must be at least 1")]
    ZeroUpstreamTimeout,
}

/// Validate a configuration, returning every violation found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.services.is_empty() {
        errors.push(ValidationError::NoServices);
    }

    let mut seen = std::collections::HashSet::new();
    for service in &config.services {
        if !seen.insert(service.name.as_str()) {
            errors.push(ValidationError::DuplicateService(service.name.clone()));
        }
        if let Some(url) = &service.url {
            if let Err(e) = Url::parse(url) {
                errors.push(ValidationError::InvalidServiceUrl(
                    service.name.clone(),
                    e.to_string(),
                ));
            }
        }
    }

    if let Err(e) = Url::parse(&config.default_service_url) {
        errors.push(ValidationError::InvalidDefaultUrl(e.to_string()));
    }

    for (name, feature) in &config.features {
        if feature.rollout_percentage > 100 {
            errors.push(ValidationError::RolloutOutOfRange(
                name.clone(),
                feature.rollout_percentage,
            ));
        }
    }

    for (service, feature) in &config.gated_services {
        if !config.services.iter().any(|s| &s.name == service) {
            errors.push(ValidationError::GatedServiceUnknown(service.clone()));
        }
        if !config.features.contains_key(feature) {
            errors.push(ValidationError::GatedFeatureUnknown(
                service.clone(),
                feature.clone(),
            ));
        }
    }

    if config.rate_limit.max_requests == 0 {
        errors.push(ValidationError::ZeroRateBudget);
    }
    if config.rate_limit.window_secs == 0 {
        errors.push(ValidationError::ZeroRateWindow);
    }
    if config.circuit_breaker.failure_threshold == 0 {
        errors.push(ValidationError::ZeroFailureThreshold);
    }
    if config.retries.max_attempts == 0 {
        errors.push(ValidationError::ZeroRetryAttempts);
    }
    if config.upstream.timeout_secs == 0 {
        errors.push(ValidationError::ZeroUpstreamTimeout);
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
    use crate::config::schema::FeatureConfig;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&GatewayConfig::default()).is_ok());
    }

    #[test]
    fn collects_every_violation() {
        let mut config = GatewayConfig::default();
        config.services.clear();
        config.rate_limit.max_requests = 0;
        config.circuit_breaker.failure_threshold = 0;

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::NoServices));
        assert!(errors.contains(&ValidationError::ZeroRateBudget));
        assert!(errors.contains(&ValidationError::ZeroFailureThreshold));
    }

    #[test]
    fn rejects_rollout_above_100() {
        let mut config = GatewayConfig::default();
        config.features.insert(
            "instant-valuation".into(),
            FeatureConfig {
                rollout_percentage: 150,
                ..FeatureConfig::default()
            },
        );

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::RolloutOutOfRange("instant-valuation".into(), 150)]
        );
    }

    #[test]
    fn rejects_gated_service_without_feature() {
        let mut config = GatewayConfig::default();
        config
            .gated_services
            .insert("valuation".into(), "instant-valuation".into());

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::GatedFeatureUnknown(
                "valuation".into(),
                "instant-valuation".into()
            )]
        );
    }

    #[test]
    fn rejects_duplicate_and_bad_url() {
        let mut config = GatewayConfig::default();
        config.services.push(crate::config::schema::ServiceConfig {
            name: "listing".into(),
            url: Some("not a url".into()),
            requires_auth: None,
        });

        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::DuplicateService(n) if n == "listing")));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::InvalidServiceUrl(n, _) if n == "listing")));
    }
}
