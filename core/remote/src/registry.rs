//! Gateway registry for resolving remote backends by name.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use coursesync_common::{Error, Result};

use crate::gateway::{AuthOracle, RemoteGateway};
use crate::memory::MemoryGateway;
use crate::stepik::create_stepik_gateway;

/// A resolved backend: the gateway plus the session check that goes with it.
#[derive(Clone)]
pub struct ResolvedGateway {
    pub gateway: Arc<dyn RemoteGateway>,
    pub auth: Arc<dyn AuthOracle>,
}

impl ResolvedGateway {
    /// Wrap a backend that answers session checks itself.
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: RemoteGateway + AuthOracle + 'static,
    {
        Self {
            gateway: backend.clone(),
            auth: backend,
        }
    }
}

/// Factory function type for creating gateways.
pub type GatewayFactory = Box<dyn Fn(Value) -> Result<ResolvedGateway> + Send + Sync>;

/// Registry for remote gateway factories.
///
/// Lets the CLI pick a backend from configuration without knowing the
/// concrete types.
pub struct GatewayRegistry {
    factories: HashMap<String, GatewayFactory>,
}

impl GatewayRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a gateway factory.
    ///
    /// # Preconditions
    /// - `name` must be unique within the registry
    ///
    /// # Errors
    /// - Returns error if name is already registered
    pub fn register(&mut self, name: impl Into<String>, factory: GatewayFactory) -> Result<()> {
        let name = name.into();
        if self.factories.contains_key(&name) {
            return Err(Error::InvalidInput(format!(
                "Gateway '{}' is already registered",
                name
            )));
        }
        self.factories.insert(name, factory);
        Ok(())
    }

    /// Resolve a gateway by name and configuration.
    ///
    /// # Errors
    /// - Gateway not registered
    /// - Configuration invalid for the gateway
    pub fn resolve(&self, name: &str, config: Value) -> Result<ResolvedGateway> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| Error::NotFound(format!("Gateway '{}' is not registered", name)))?;
        factory(config)
    }

    /// Names of the registered gateways, sorted.
    pub fn gateways(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn has_gateway(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }
}

impl Default for GatewayRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Create a registry with the built-in gateways.
pub fn create_default_registry() -> GatewayRegistry {
    let mut factories: HashMap<String, GatewayFactory> = HashMap::new();

    // In-memory platform (dry runs and tests)
    factories.insert(
        "memory".to_string(),
        Box::new(|_config| Ok(ResolvedGateway::from_backend(Arc::new(MemoryGateway::new())))),
    );

    factories.insert(
        "stepik".to_string(),
        Box::new(|config| Ok(ResolvedGateway::from_backend(create_stepik_gateway(config)?))),
    );

    GatewayRegistry { factories }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn memory_factory() -> GatewayFactory {
        Box::new(|_| Ok(ResolvedGateway::from_backend(Arc::new(MemoryGateway::new()))))
    }

    #[test]
    fn test_register_and_resolve() {
        let mut registry = GatewayRegistry::new();
        registry.register("test", memory_factory()).unwrap();

        let resolved = registry.resolve("test", Value::Null).unwrap();
        assert_eq!(resolved.gateway.name(), "memory");
        assert!(resolved.auth.is_logged_in());
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let mut registry = GatewayRegistry::new();
        registry.register("test", memory_factory()).unwrap();

        let result = registry.register("test", memory_factory());
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_resolve_unknown_fails() {
        let registry = GatewayRegistry::new();
        let result = registry.resolve("unknown", Value::Null);
        assert!(matches!(result, Err(e) if e.is_not_found()));
    }

    #[test]
    fn test_default_registry() {
        let registry = create_default_registry();
        assert_eq!(registry.gateways(), vec!["memory".to_string(), "stepik".to_string()]);

        let stepik = registry
            .resolve("stepik", json!({"api_url": "https://example.org/api"}))
            .unwrap();
        assert_eq!(stepik.gateway.name(), "stepik");
        assert!(!stepik.auth.is_logged_in());
    }

    #[test]
    fn test_default_registry_rejects_bad_config() {
        let registry = create_default_registry();
        let result = registry.resolve("stepik", json!({"api_url": 5}));
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }
}
