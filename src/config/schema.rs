//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files, and
//! every field has a default so a minimal (or empty) config is valid.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Root configuration for the request gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, inbound limits).
    pub listener: ListenerConfig,

    /// Registered backend services.
    pub services: Vec<ServiceConfig>,

    /// Fallback base URL used for services without an explicit `url`.
    pub default_service_url: String,

    /// Token verification settings.
    pub auth: AuthConfig,

    /// Per-client-address rate limiting.
    pub rate_limit: RateLimitConfig,

    /// Per-service circuit breaker settings.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Retry settings for upstream calls.
    pub retries: RetryConfig,

    /// Upstream call timeouts.
    pub upstream: UpstreamConfig,

    /// Cross-origin settings.
    pub cors: CorsConfig,

    /// Feature definitions, keyed by feature name.
    pub features: HashMap<String, FeatureConfig>,

    /// Services whose routes are feature-gated: service name -> feature name.
    pub gated_services: HashMap<String, String>,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            services: default_services(),
            default_service_url: "http://127.0.0.1:3000".to_string(),
            auth: AuthConfig::default(),
            rate_limit: RateLimitConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            retries: RetryConfig::default(),
            upstream: UpstreamConfig::default(),
            cors: CorsConfig::default(),
            features: HashMap::new(),
            gated_services: HashMap::new(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Default service set exposed by a fresh gateway.
///
/// Each entry maps to a route group at `/api/v1/<name>`; `identity` is the
/// only service reachable without a token (it issues them).
fn default_services() -> Vec<ServiceConfig> {
    [
        ("identity", "http://127.0.0.1:3001"),
        ("listing", "http://127.0.0.1:3002"),
        ("valuation", "http://127.0.0.1:3003"),
        ("matching", "http://127.0.0.1:3004"),
        ("notification", "http://127.0.0.1:3005"),
        ("document", "http://127.0.0.1:3006"),
    ]
    .into_iter()
    .map(|(name, url)| ServiceConfig {
        name: name.to_string(),
        url: Some(url.to_string()),
        requires_auth: None,
    })
    .collect()
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Total inbound request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Maximum inbound request body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
            max_body_bytes: 2 * 1024 * 1024,
        }
    }
}

/// A single backend service registration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    /// Logical service name; becomes the `/api/v1/<name>` route group.
    pub name: String,

    /// Base URL of the service. Falls back to `default_service_url` if unset.
    #[serde(default)]
    pub url: Option<String>,

    /// Explicit auth override. When unset, every service except the
    /// configured public one requires a valid token.
    #[serde(default)]
    pub requires_auth: Option<bool>,
}

/// Token verification settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC secret used to verify bearer tokens.
    pub jwt_secret: String,

    /// The one service reachable without a token (the token issuer).
    pub public_service: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            // WARNING: This is a placeholder! Change this in production.
            jwt_secret: "CHANGE_ME_IN_PRODUCTION".to_string(),
            public_service: "identity".to_string(),
        }
    }
}

/// Rate limiting configuration (fixed window per client address).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Maximum requests per window per client address.
    pub max_requests: u32,

    /// Window length in seconds.
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: 1000,
            window_secs: 15 * 60,
        }
    }
}

/// Circuit breaker configuration, applied per service.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,

    /// Seconds the circuit stays open before admitting a probe.
    pub reset_timeout_secs: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout_secs: 30,
        }
    }
}

/// Retry configuration for upstream calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts, first try included.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 2000,
        }
    }
}

/// Upstream call timeouts. The call timeout is an overall budget: retries
/// and their backoff delays consume from it rather than resetting it.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Overall per-call budget (all attempts plus backoff) in seconds.
    pub timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 3,
            timeout_secs: 10,
        }
    }
}

/// Cross-origin settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Allowed origin for browser calls; "*" allows any origin.
    pub allowed_origin: String,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origin: "*".to_string(),
        }
    }
}

/// A single feature definition.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Globally enable/disable the feature.
    pub enabled: bool,

    /// Restrict to paid subscribers (or roles in `roles_enabled`).
    pub pro_only: bool,

    /// Roles exempt from the `pro_only` restriction.
    pub roles_enabled: Vec<String>,

    /// Percentage of users admitted, 0..=100.
    pub rollout_percentage: u8,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            pro_only: false,
            roles_enabled: Vec::new(),
            rollout_percentage: 100,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
