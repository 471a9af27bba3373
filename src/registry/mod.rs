//! Service registry subsystem.
//!
//! # Data Flow
//! ```text
//! GatewayConfig.services
//!     → ServiceRegistry::from_config (resolve base URLs, check auth invariant)
//!     → immutable name → ServiceDescriptor map
//!     → router builder iterates it once at startup
//!     → resilient client resolves per call
//! ```
//!
//! # Design Decisions
//! - Built once at startup, immutable for the process lifetime; shared via
//!   Arc without locks
//! - A service without an explicit URL falls back to `default_service_url`,
//!   so registering a name is enough to expose `/api/v1/<name>/*`
//! - Exactly one descriptor (the token issuer) may skip auth; this is
//!   checked here at construction, never per request

use std::collections::HashMap;
use url::Url;

use crate::config::GatewayConfig;

/// An immutable description of one backend service.
#[derive(Debug, Clone)]
pub struct ServiceDescriptor {
    /// Logical name, doubling as the route-group path segment.
    pub name: String,

    /// Base address all calls for this service are sent to.
    pub base_address: Url,

    /// Whether routes for this service require a verified token.
    pub requires_auth: bool,
}

/// Error raised while building the registry.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("service '{0}' registered twice")]
    Duplicate(String),

    #[error("service '{0}' has an unparseable base address '{1}'")]
    BadAddress(String, String),

    #[error("service '{0}' must require auth; only '{1}' may be public")]
    UnprotectedService(String, String),

    #[error("public service '{0}' is not in the registered service set")]
    UnknownPublicService(String),
}

/// Static mapping of logical service name to descriptor.
#[derive(Debug)]
pub struct ServiceRegistry {
    services: HashMap<String, ServiceDescriptor>,
    /// Registration order, kept so generated routes are deterministic.
    order: Vec<String>,
}

impl ServiceRegistry {
    /// Build the registry from configuration.
    ///
    /// Enforces the auth invariant: `requires_auth = false` is permitted for
    /// exactly the configured public service (the identity entry point);
    /// every other descriptor must require auth.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, RegistryError> {
        let public = &config.auth.public_service;
        let mut services = HashMap::new();
        let mut order = Vec::new();

        for svc in &config.services {
            let raw = svc.url.as_deref().unwrap_or(&config.default_service_url);
            let base_address = Url::parse(raw)
                .map_err(|_| RegistryError::BadAddress(svc.name.clone(), raw.to_string()))?;

            let requires_auth = svc.requires_auth.unwrap_or(&svc.name != public);
            if !requires_auth && &svc.name != public {
                return Err(RegistryError::UnprotectedService(
                    svc.name.clone(),
                    public.clone(),
                ));
            }

            let descriptor = ServiceDescriptor {
                name: svc.name.clone(),
                base_address,
                requires_auth,
            };
            if services.insert(svc.name.clone(), descriptor).is_some() {
                return Err(RegistryError::Duplicate(svc.name.clone()));
            }
            order.push(svc.name.clone());
        }

        if !services.contains_key(public) {
            return Err(RegistryError::UnknownPublicService(public.clone()));
        }

        tracing::info!(
            services = services.len(),
            public_service = %public,
            "Service registry built"
        );

        Ok(Self { services, order })
    }

    /// Resolve a logical service name to its descriptor.
    pub fn resolve(&self, name: &str) -> Option<&ServiceDescriptor> {
        self.services.get(name)
    }

    /// Iterate descriptors in registration order.
    pub fn descriptors(&self) -> impl Iterator<Item = &ServiceDescriptor> {
        self.order.iter().filter_map(|name| self.services.get(name))
    }

    /// Registered service names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceConfig;

    fn config_with(services: Vec<ServiceConfig>) -> GatewayConfig {
        GatewayConfig {
            services,
            ..GatewayConfig::default()
        }
    }

    fn svc(name: &str) -> ServiceConfig {
        ServiceConfig {
            name: name.into(),
            url: None,
            requires_auth: None,
        }
    }

    #[test]
    fn resolves_registered_service() {
        let registry = ServiceRegistry::from_config(&GatewayConfig::default()).unwrap();

        let listing = registry.resolve("listing").unwrap();
        assert_eq!(listing.base_address.as_str(), "http://127.0.0.1:3002/");
        assert!(listing.requires_auth);
        assert!(registry.resolve("inventory").is_none());
    }

    #[test]
    fn only_identity_is_public_by_default() {
        let registry = ServiceRegistry::from_config(&GatewayConfig::default()).unwrap();

        for descriptor in registry.descriptors() {
            assert_eq!(descriptor.requires_auth, descriptor.name != "identity");
        }
    }

    #[test]
    fn missing_url_falls_back_to_default() {
        let mut config = config_with(vec![svc("identity"), svc("reporting")]);
        config.default_service_url = "http://fallback:9000".into();

        let registry = ServiceRegistry::from_config(&config).unwrap();
        assert_eq!(
            registry.resolve("reporting").unwrap().base_address.as_str(),
            "http://fallback:9000/"
        );
    }

    #[test]
    fn rejects_unprotected_non_identity_service() {
        let mut config = config_with(vec![
            svc("identity"),
            ServiceConfig {
                name: "listing".into(),
                url: None,
                requires_auth: Some(false),
            },
        ]);
        config.default_service_url = "http://fallback:9000".into();

        let err = ServiceRegistry::from_config(&config).unwrap_err();
        assert!(matches!(err, RegistryError::UnprotectedService(name, _) if name == "listing"));
    }

    #[test]
    fn rejects_missing_public_service() {
        let config = config_with(vec![svc("listing")]);

        let err = ServiceRegistry::from_config(&config).unwrap_err();
        assert!(matches!(err, RegistryError::UnknownPublicService(name) if name == "identity"));
    }

    #[test]
    fn rejects_duplicate_names() {
        let config = config_with(vec![svc("identity"), svc("listing"), svc("listing")]);

        let err = ServiceRegistry::from_config(&config).unwrap_err();
        assert!(matches!(err, RegistryError::Duplicate(name) if name == "listing"));
    }

    #[test]
    fn preserves_registration_order() {
        let registry = ServiceRegistry::from_config(&GatewayConfig::default()).unwrap();
        let names: Vec<_> = registry.names().collect();
        assert_eq!(names[0], "identity");
        assert_eq!(names.len(), 6);
    }
}
