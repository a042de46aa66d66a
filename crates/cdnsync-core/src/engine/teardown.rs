//! Service teardown
//!
//! Deleting is not confirmed by the remote system, so the service list is
//! checked afterwards and a service that is still listed is an error.

use std::sync::Arc;
use tracing::{info, warn};

use super::events::{EventSink, ReconcileEvent};
use super::versions::VersionManager;
use crate::error::{Error, Result, ResultExt};
use crate::model::ServiceId;
use crate::traits::CdnApi;

/// Deletes a service and confirms it is gone
///
/// With `force`, the active version is deactivated first; the remote system
/// refuses to delete a service that is serving traffic.
#[derive(Clone)]
pub struct DeletionController {
    api: Arc<dyn CdnApi>,
    versions: VersionManager,
    events: EventSink,
}

impl DeletionController {
    pub(crate) fn new(api: Arc<dyn CdnApi>, versions: VersionManager, events: EventSink) -> Self {
        Self {
            api,
            versions,
            events,
        }
    }

    /// Delete `service`
    ///
    /// # Errors
    ///
    /// - Any failing remote call, wrapped with the service id
    /// - [`Error::StillPresent`] if the service is still listed afterwards
    pub async fn delete(&self, service: &ServiceId, force: bool) -> Result<()> {
        if force {
            let record = self
                .api
                .get_service(service)
                .await
                .with_context(|| format!("fetching service {} before delete", service))?;
            self.versions
                .deactivate(service, record.active_version)
                .await?;
        }

        self.api
            .delete_service(service)
            .await
            .with_context(|| format!("deleting service {}", service))?;

        let remaining = self
            .api
            .list_services()
            .await
            .with_context(|| format!("listing services after deleting {}", service))?;

        if remaining.iter().any(|s| &s.id == service) {
            warn!("Tried deleting service {}, but it was still found", service);
            return Err(Error::StillPresent {
                service_id: service.clone(),
            });
        }

        info!("Deleted service {}", service);
        self.events.emit(ReconcileEvent::Deleted {
            service_id: service.clone(),
        });
        Ok(())
    }
}
