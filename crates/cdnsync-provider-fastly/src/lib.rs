// # Fastly API Provider
//
// This crate provides the Fastly API v1 implementation of `CdnApi`.
//
// ## Responsibilities
//
// **Allowed**:
// - HTTPS calls to the configured Fastly endpoint only
// - Encoding form bodies and decoding JSON responses
// - Mapping HTTP status codes to `cdnsync_core::Error`
//
// **Forbidden** (owned by `Reconciler`):
// - Retry or backoff
// - Deciding whether a change is needed
// - Waiting for cloned versions to settle
// - Caching remote state between calls
//
// ## Security Requirements
//
// - API key NEVER appears in logs or Debug output
// - Client construction fails fast on an empty key
//
// ## API Reference
//
// - https://www.fastly.com/documentation/reference/api/
// - Service: `/service`, `/service/:id`, `/service/:id/details`
// - Version: `/service/:id/version/:v/{clone,validate,activate,deactivate}`
// - Settings: `/service/:id/version/:v/settings`
// - Domain: `/service/:id/version/:v/domain[/:name]`
// - Backend: `/service/:id/version/:v/backend[/:name]`

mod client;
pub mod wire;

pub use client::{FASTLY_API_BASE, FastlyClient};

use cdnsync_core::config::ProviderConfig;
use cdnsync_core::traits::{CdnApi, CdnApiFactory};
use cdnsync_core::{Error, ProviderRegistry, Result};
use std::sync::Arc;

/// Factory for creating Fastly clients
pub struct FastlyFactory;

impl CdnApiFactory for FastlyFactory {
    fn create(&self, config: &ProviderConfig) -> Result<Arc<dyn CdnApi>> {
        match config {
            ProviderConfig::Fastly { api_key, base_url } => {
                if api_key.is_empty() {
                    return Err(Error::config("Fastly API key is required"));
                }

                let client = match base_url {
                    Some(url) => {
                        tracing::info!("Using Fastly endpoint {}", url);
                        FastlyClient::with_base_url(api_key.clone(), url)?
                    }
                    None => FastlyClient::new(api_key.clone())?,
                };
                Ok(Arc::new(client))
            }
            _ => Err(Error::config("Invalid config for Fastly provider")),
        }
    }
}

/// Register the Fastly provider with a registry
///
/// # Example
///
/// ```rust
/// use cdnsync_core::ProviderRegistry;
///
/// let registry = ProviderRegistry::new();
/// cdnsync_provider_fastly::register(&registry);
/// assert!(registry.has_provider("fastly"));
/// ```
pub fn register(registry: &ProviderRegistry) {
    registry.register_provider("fastly", Box::new(FastlyFactory));
}
