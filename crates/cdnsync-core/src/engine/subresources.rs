//! Domain and backend synchronization inside a draft version
//!
//! All removals run before any addition, so a member that is being replaced
//! under the same name never collides with its old value. The first failing
//! call aborts the sync; the partially edited draft stays inactive.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::fmt;
use std::ops::Add;
use std::sync::Arc;
use tracing::{debug, info};

use super::differ;
use super::events::{EventSink, ReconcileEvent, SubresourceKind};
use crate::error::{Result, ResultExt};
use crate::model::{Backend, Domain, ServiceConfig, ServiceId, VersionNumber};
use crate::traits::CdnApi;

/// A named, versioned member of a service configuration
#[async_trait]
pub trait Subresource: Ord + Clone + fmt::Debug + Send + Sync {
    /// Kind reported in logs, errors and events
    const KIND: SubresourceKind;

    /// Name the remote system keys the member by
    fn name(&self) -> &str;

    /// Create this member in a draft version
    async fn create(
        &self,
        api: &dyn CdnApi,
        service: &ServiceId,
        version: VersionNumber,
    ) -> Result<()>;

    /// Delete this member (by name) from a draft version
    async fn delete(
        &self,
        api: &dyn CdnApi,
        service: &ServiceId,
        version: VersionNumber,
    ) -> Result<()>;
}

#[async_trait]
impl Subresource for Domain {
    const KIND: SubresourceKind = SubresourceKind::Domain;

    fn name(&self) -> &str {
        &self.name
    }

    async fn create(
        &self,
        api: &dyn CdnApi,
        service: &ServiceId,
        version: VersionNumber,
    ) -> Result<()> {
        api.create_domain(service, version, self).await
    }

    async fn delete(
        &self,
        api: &dyn CdnApi,
        service: &ServiceId,
        version: VersionNumber,
    ) -> Result<()> {
        api.delete_domain(service, version, &self.name).await
    }
}

#[async_trait]
impl Subresource for Backend {
    const KIND: SubresourceKind = SubresourceKind::Backend;

    fn name(&self) -> &str {
        &self.name
    }

    async fn create(
        &self,
        api: &dyn CdnApi,
        service: &ServiceId,
        version: VersionNumber,
    ) -> Result<()> {
        // Empty TLS bounds must be omitted, not sent as ""
        api.create_backend(service, version, &self.normalized()).await
    }

    async fn delete(
        &self,
        api: &dyn CdnApi,
        service: &ServiceId,
        version: VersionNumber,
    ) -> Result<()> {
        api.delete_backend(service, version, &self.name).await
    }
}

/// Number of remote mutations a sync performed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Members deleted
    pub removed: usize,
    /// Members created
    pub added: usize,
}

impl SyncReport {
    /// Whether nothing was changed
    pub fn is_empty(&self) -> bool {
        self.removed == 0 && self.added == 0
    }
}

impl Add for SyncReport {
    type Output = SyncReport;

    fn add(self, other: SyncReport) -> SyncReport {
        SyncReport {
            removed: self.removed + other.removed,
            added: self.added + other.added,
        }
    }
}

/// Applies set differences of sub-resources to a draft version
#[derive(Clone)]
pub struct SubresourceSync {
    api: Arc<dyn CdnApi>,
    events: EventSink,
}

impl SubresourceSync {
    pub(crate) fn new(api: Arc<dyn CdnApi>, events: EventSink) -> Self {
        Self { api, events }
    }

    /// Bring one kind of sub-resource in `version` from `old` to `new`
    ///
    /// # Errors
    ///
    /// The first failing remote call, wrapped with the service, version,
    /// kind and member name.
    pub async fn sync<T: Subresource>(
        &self,
        service: &ServiceId,
        version: VersionNumber,
        old: &BTreeSet<T>,
        new: &BTreeSet<T>,
    ) -> Result<SyncReport> {
        let diff = differ::diff(old, new);
        if diff.is_empty() {
            debug!("No {} changes for service {}", T::KIND, service);
            return Ok(SyncReport::default());
        }

        for item in &diff.to_remove {
            item.delete(self.api.as_ref(), service, version)
                .await
                .with_context(|| {
                    format!(
                        "deleting {} {} from service {} version {}",
                        T::KIND,
                        item.name(),
                        service,
                        version
                    )
                })?;

            debug!("Removed {} {} from version {}", T::KIND, item.name(), version);
            self.events.emit(ReconcileEvent::SubresourceRemoved {
                service_id: service.clone(),
                version,
                kind: T::KIND,
                name: item.name().to_string(),
            });
        }

        for item in &diff.to_add {
            item.create(self.api.as_ref(), service, version)
                .await
                .with_context(|| {
                    format!(
                        "creating {} {} in service {} version {}",
                        T::KIND,
                        item.name(),
                        service,
                        version
                    )
                })?;

            debug!("Added {} {} to version {}", T::KIND, item.name(), version);
            self.events.emit(ReconcileEvent::SubresourceAdded {
                service_id: service.clone(),
                version,
                kind: T::KIND,
                name: item.name().to_string(),
            });
        }

        info!(
            "Synced {}s of service {} version {}: {} removed, {} added",
            T::KIND,
            service,
            version,
            diff.to_remove.len(),
            diff.to_add.len()
        );

        Ok(SyncReport {
            removed: diff.to_remove.len(),
            added: diff.to_add.len(),
        })
    }

    /// Sync domains, then backends
    pub async fn sync_all(
        &self,
        service: &ServiceId,
        version: VersionNumber,
        old: &ServiceConfig,
        new: &ServiceConfig,
    ) -> Result<SyncReport> {
        let domains = self
            .sync(service, version, &old.domains, &new.domains)
            .await?;
        let backends = self
            .sync(service, version, &old.backends, &new.backends)
            .await?;
        Ok(domains + backends)
    }
}
