//! Default host and TTL of a draft version

use std::sync::Arc;
use tracing::debug;

use super::events::{EventSink, ReconcileEvent};
use crate::error::{Result, ResultExt};
use crate::model::{ServiceId, Settings, VersionNumber};
use crate::traits::CdnApi;

/// Writes default host and TTL to a draft version
///
/// An empty default host is never sent; the TTL always is.
#[derive(Clone)]
pub struct SettingsSync {
    api: Arc<dyn CdnApi>,
    events: EventSink,
}

impl SettingsSync {
    pub(crate) fn new(api: Arc<dyn CdnApi>, events: EventSink) -> Self {
        Self { api, events }
    }

    /// Update the settings of `version` in place
    pub async fn apply(
        &self,
        service: &ServiceId,
        version: VersionNumber,
        desired: &Settings,
    ) -> Result<()> {
        let update = desired.normalized();

        self.api
            .update_settings(service, version, &update)
            .await
            .with_context(|| {
                format!(
                    "updating settings of service {} version {}",
                    service, version
                )
            })?;

        debug!(
            "Updated settings of service {} version {} (default_host: {:?}, default_ttl: {})",
            service, version, update.default_host, update.default_ttl
        );
        self.events.emit(ReconcileEvent::SettingsUpdated {
            service_id: service.clone(),
            version,
        });
        Ok(())
    }
}
