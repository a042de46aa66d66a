// # CDN API Trait
//
// Defines the interface the reconciler consumes to talk to the remote CDN.
//
// ## Implementations
//
// - Fastly: `cdnsync-provider-fastly` crate
//
// ## Usage
//
// ```rust,ignore
// use cdnsync_core::{CdnApi, ServiceId, VersionNumber};
//
// async fn show(api: &dyn CdnApi) -> cdnsync_core::Result<()> {
//     let service = api.get_service(&ServiceId::new("SU1Z0isxPaozGVKXdv0eY")).await?;
//     if let Some(version) = service.active_version {
//         let domains = api.list_domains(&service.id, version).await?;
//         println!("{} serves {} domains", service.name, domains.len());
//     }
//     Ok(())
// }
// ```

use async_trait::async_trait;
use std::sync::Arc;

use crate::model::{
    Backend, Domain, ServiceId, ServiceRecord, Settings, Validation, VersionInfo, VersionNumber,
};

/// Typed operations of the remote CDN configuration API
///
/// Every method is a single remote call. Implementations own transport,
/// authentication and request encoding.
///
/// # Forbidden Capabilities
///
/// - Retrying failed calls (a failure aborts the reconciliation attempt)
/// - Deciding whether a change is needed (owned by `Reconciler`)
/// - Caching remote state between calls
///
/// # Thread Safety
///
/// Implementations are shared as `Arc<dyn CdnApi>` and must be usable across
/// async tasks.
#[async_trait]
pub trait CdnApi: Send + Sync {
    /// Create a service; the remote system assigns its id and an inactive
    /// draft version 1
    async fn create_service(&self, name: &str, comment: &str)
    -> Result<ServiceRecord, crate::Error>;

    /// Fetch a service with its active version
    async fn get_service(&self, service: &ServiceId) -> Result<ServiceRecord, crate::Error>;

    /// Rename a service (not versioned)
    async fn update_service(
        &self,
        service: &ServiceId,
        name: &str,
    ) -> Result<ServiceRecord, crate::Error>;

    /// Delete a service
    async fn delete_service(&self, service: &ServiceId) -> Result<(), crate::Error>;

    /// List every service visible to the credentials
    async fn list_services(&self) -> Result<Vec<ServiceRecord>, crate::Error>;

    /// Deep-copy `from` into a new draft version and return its number
    async fn clone_version(
        &self,
        service: &ServiceId,
        from: VersionNumber,
    ) -> Result<VersionNumber, crate::Error>;

    /// Fetch the activation state of a version
    async fn get_version(
        &self,
        service: &ServiceId,
        version: VersionNumber,
    ) -> Result<VersionInfo, crate::Error>;

    /// Run remote validation of a version's full configuration
    async fn validate_version(
        &self,
        service: &ServiceId,
        version: VersionNumber,
    ) -> Result<Validation, crate::Error>;

    /// Lock and promote a version to active
    async fn activate_version(
        &self,
        service: &ServiceId,
        version: VersionNumber,
    ) -> Result<(), crate::Error>;

    /// Demote the active version
    async fn deactivate_version(
        &self,
        service: &ServiceId,
        version: VersionNumber,
    ) -> Result<(), crate::Error>;

    /// Fetch default host and TTL of a version
    async fn get_settings(
        &self,
        service: &ServiceId,
        version: VersionNumber,
    ) -> Result<Settings, crate::Error>;

    /// Update settings of a draft version in place
    ///
    /// `settings.default_host == None` leaves the remote value untouched.
    async fn update_settings(
        &self,
        service: &ServiceId,
        version: VersionNumber,
        settings: &Settings,
    ) -> Result<(), crate::Error>;

    /// List the domains of a version
    async fn list_domains(
        &self,
        service: &ServiceId,
        version: VersionNumber,
    ) -> Result<Vec<Domain>, crate::Error>;

    /// Add a domain to a draft version
    async fn create_domain(
        &self,
        service: &ServiceId,
        version: VersionNumber,
        domain: &Domain,
    ) -> Result<(), crate::Error>;

    /// Remove a domain from a draft version by name
    async fn delete_domain(
        &self,
        service: &ServiceId,
        version: VersionNumber,
        name: &str,
    ) -> Result<(), crate::Error>;

    /// List the backends of a version
    async fn list_backends(
        &self,
        service: &ServiceId,
        version: VersionNumber,
    ) -> Result<Vec<Backend>, crate::Error>;

    /// Add a backend to a draft version
    ///
    /// `None` TLS versions must be omitted from the request, not sent empty.
    async fn create_backend(
        &self,
        service: &ServiceId,
        version: VersionNumber,
        backend: &Backend,
    ) -> Result<(), crate::Error>;

    /// Remove a backend from a draft version by name
    async fn delete_backend(
        &self,
        service: &ServiceId,
        version: VersionNumber,
        name: &str,
    ) -> Result<(), crate::Error>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}

/// Helper trait for constructing API clients from configuration
pub trait CdnApiFactory: Send + Sync {
    /// Create a client instance from configuration
    fn create(
        &self,
        config: &crate::config::ProviderConfig,
    ) -> Result<Arc<dyn CdnApi>, crate::Error>;
}
