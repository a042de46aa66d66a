//! Plugin-based provider registry
//!
//! The registry maps provider type names to [`CdnApiFactory`] objects so the
//! remote client is built from configuration instead of a hard-coded match.
//!
//! ## Registration
//!
//! Provider crates expose a `register()` function:
//!
//! ```rust,ignore
//! let registry = ProviderRegistry::new();
//! cdnsync_provider_fastly::register(&registry);
//! let api = registry.create_provider(&config.provider)?;
//! ```

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::config::ProviderConfig;
use crate::error::{Error, Result};
use crate::traits::{CdnApi, CdnApiFactory};

/// Provider registry for plugin-based API client creation
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: RwLock<HashMap<String, Box<dyn CdnApiFactory>>>,
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider factory under a type name (e.g. "fastly")
    pub fn register_provider(&self, name: impl Into<String>, factory: Box<dyn CdnApiFactory>) {
        self.providers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), factory);
    }

    /// Create an API client from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Arc<dyn CdnApi>)`: Created client
    /// - `Err(Error)`: If the provider type is not registered or creation fails
    pub fn create_provider(&self, config: &ProviderConfig) -> Result<Arc<dyn CdnApi>> {
        let provider_type = config.type_name();
        let providers = self.providers.read().unwrap_or_else(PoisonError::into_inner);

        let factory = providers
            .get(provider_type)
            .ok_or_else(|| Error::config(format!("Unknown provider type: {}", provider_type)))?;

        factory.create(config)
    }

    /// List all registered provider types
    pub fn list_providers(&self) -> Vec<String> {
        self.providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Check if a provider type is registered
    pub fn has_provider(&self, name: &str) -> bool {
        self.providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockProviderFactory;

    impl CdnApiFactory for MockProviderFactory {
        fn create(&self, _config: &ProviderConfig) -> Result<Arc<dyn CdnApi>> {
            Err(Error::not_found("Mock provider not implemented"))
        }
    }

    #[test]
    fn test_registry_registration() {
        let registry = ProviderRegistry::new();
        assert!(!registry.has_provider("mock"));

        registry.register_provider("mock", Box::new(MockProviderFactory));

        assert!(registry.has_provider("mock"));
        assert!(registry.list_providers().contains(&"mock".to_string()));
    }

    #[test]
    fn unknown_provider_is_a_config_error() {
        let registry = ProviderRegistry::new();
        let config = ProviderConfig::Fastly {
            api_key: "key".to_string(),
            base_url: None,
        };

        let err = registry.create_provider(&config).err().unwrap();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn factory_selected_by_type_name() {
        let registry = ProviderRegistry::new();
        registry.register_provider("fastly", Box::new(MockProviderFactory));
        let config = ProviderConfig::Fastly {
            api_key: "key".to_string(),
            base_url: None,
        };

        // The mock factory's own error proves it was the one called
        let err = registry.create_provider(&config).err().unwrap();
        assert!(err.is_not_found());
    }
}
