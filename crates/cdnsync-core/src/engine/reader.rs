//! Observed state of a service, read from its active version or a draft

use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

use crate::error::{Result, ResultExt};
use crate::model::{ServiceConfig, ServiceId, ServiceSnapshot, Settings, VersionNumber, non_empty};
use crate::traits::CdnApi;

/// Builds a [`ServiceSnapshot`] from the remote system
///
/// Empty strings reported for optional fields (domain comments, TLS bounds,
/// default host) are surfaced as `None`, matching how declarations express
/// "unset".
#[derive(Clone)]
pub struct StateReader {
    api: Arc<dyn CdnApi>,
}

impl StateReader {
    pub(crate) fn new(api: Arc<dyn CdnApi>) -> Self {
        Self { api }
    }

    /// Read the service record and everything in its active version
    ///
    /// Without an active version, settings are left at their defaults and
    /// both sub-resource sets are empty.
    pub async fn read(&self, service: &ServiceId) -> Result<ServiceSnapshot> {
        let record = self
            .api
            .get_service(service)
            .await
            .with_context(|| format!("fetching service {}", service))?;

        let mut snapshot = ServiceSnapshot {
            id: record.id,
            name: record.name,
            active_version: record.active_version,
            settings: Settings::default(),
            domains: BTreeSet::new(),
            backends: BTreeSet::new(),
        };

        let Some(version) = record.active_version else {
            debug!("Service {} has no active version, nothing to read", service);
            return Ok(snapshot);
        };

        let contents = self.read_version(service, version).await?;
        snapshot.settings = contents.settings;
        snapshot.domains = contents.domains;
        snapshot.backends = contents.backends;

        debug!(
            "Read service {} version {}: {} domains, {} backends",
            service,
            version,
            snapshot.domains.len(),
            snapshot.backends.len()
        );

        Ok(snapshot)
    }

    /// Settings, domains and backends of one version, as a declaration
    ///
    /// The name is left empty; only the versioned parts are read.
    pub async fn read_version(
        &self,
        service: &ServiceId,
        version: VersionNumber,
    ) -> Result<ServiceConfig> {
        let mut contents = ServiceConfig::new(String::new());

        contents.settings = self
            .api
            .get_settings(service, version)
            .await
            .with_context(|| {
                format!("reading settings of service {} version {}", service, version)
            })?
            .normalized();

        contents.domains = self
            .api
            .list_domains(service, version)
            .await
            .with_context(|| format!("listing domains of service {} version {}", service, version))?
            .into_iter()
            .map(|mut domain| {
                domain.comment = non_empty(domain.comment.take());
                domain
            })
            .collect();

        contents.backends = self
            .api
            .list_backends(service, version)
            .await
            .with_context(|| {
                format!("listing backends of service {} version {}", service, version)
            })?
            .iter()
            .map(|backend| backend.normalized())
            .collect();

        Ok(contents)
    }
}
