//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! built-in defaults
//!     → loader.rs (optional TOML file, parsed via serde)
//!     → loader.rs (environment overrides, language-neutral names)
//!     → validation.rs (semantic checks, all errors collected)
//!     → GatewayConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the service set never changes during
//!   a process lifetime, so adding a service is a restart-time change
//! - All fields have defaults to allow minimal configs
//! - Environment wins over file wins over defaults

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_from_env, ConfigError};
pub use schema::GatewayConfig;
pub use schema::{
    AuthConfig, CircuitBreakerConfig, CorsConfig, FeatureConfig, ListenerConfig,
    ObservabilityConfig, RateLimitConfig, RetryConfig, ServiceConfig, UpstreamConfig,
};
