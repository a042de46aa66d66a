//! Version lifecycle: pick a writable draft, validate, activate, deactivate
//!
//! A locked version is never written to. When a service has an active
//! version, changes go to a clone of it. A service that never had a version
//! activated writes to its initial draft; one whose versions were all
//! deactivated clones the latest of them.

use std::sync::Arc;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::events::{EventSink, ReconcileEvent};
use crate::config::SettlePolicy;
use crate::error::{Error, Result, ResultExt};
use crate::model::{ServiceId, ServiceRecord, Validation, VersionNumber};
use crate::traits::CdnApi;

/// Version receiving the writes of one attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkingVersion {
    /// Version 1 of a service created in the same attempt; known to be empty
    Initial,
    /// Settled clone of a locked version
    Cloned {
        version: VersionNumber,
        from: VersionNumber,
    },
    /// Unlocked latest version of a service with nothing active; may hold
    /// writes from an earlier failed attempt
    Draft { version: VersionNumber },
}

impl WorkingVersion {
    /// Number of the version to write to
    pub fn number(&self) -> VersionNumber {
        match self {
            WorkingVersion::Initial => VersionNumber::INITIAL,
            WorkingVersion::Cloned { version, .. } | WorkingVersion::Draft { version } => *version,
        }
    }
}

/// Drives the draft → validate → active lifecycle of one service at a time
#[derive(Clone)]
pub struct VersionManager {
    api: Arc<dyn CdnApi>,
    settle: SettlePolicy,
    events: EventSink,
}

impl VersionManager {
    pub(crate) fn new(api: Arc<dyn CdnApi>, settle: SettlePolicy, events: EventSink) -> Self {
        Self {
            api,
            settle,
            events,
        }
    }

    /// The untouched version 1 of a service created in this attempt
    pub fn initial_draft(&self, service: &ServiceId) -> WorkingVersion {
        debug!(
            "Service {} is new, writing to version {}",
            service,
            VersionNumber::INITIAL
        );
        self.resolved(service, VersionNumber::INITIAL, None);
        WorkingVersion::Initial
    }

    /// Choose the version that will receive this attempt's writes
    ///
    /// # Parameters
    ///
    /// - `record`: The service as just fetched
    ///
    /// # Returns
    ///
    /// - A settled clone of the active version, when one is active
    /// - The latest version itself when nothing is active and it still
    ///   accepts writes (the initial draft of a service that was never
    ///   activated, or a draft left by a failed attempt)
    /// - Otherwise a settled clone of the latest version, which is locked
    ///   because it was activated before
    ///
    /// # Errors
    ///
    /// - Inspect or clone failure, wrapped with the service and version
    /// - [`Error::VersionNotReady`] when a clone never became writable
    pub async fn resolve_working_version(&self, record: &ServiceRecord) -> Result<WorkingVersion> {
        let service = &record.id;

        if let Some(active) = record.active_version {
            return self.clone_settled(service, active).await;
        }

        let latest = record.latest_version.unwrap_or(VersionNumber::INITIAL);
        let info = self
            .api
            .get_version(service, latest)
            .await
            .with_context(|| format!("inspecting version {} of service {}", latest, service))?;

        if info.is_writable() {
            debug!(
                "Service {} has no active version, writing to draft version {}",
                service, latest
            );
            self.resolved(service, latest, None);
            return Ok(WorkingVersion::Draft { version: latest });
        }

        info!(
            "Service {} has no active version and version {} is locked, cloning it",
            service, latest
        );
        self.clone_settled(service, latest).await
    }

    async fn clone_settled(&self, service: &ServiceId, from: VersionNumber) -> Result<WorkingVersion> {
        let version = self
            .api
            .clone_version(service, from)
            .await
            .with_context(|| format!("cloning version {} of service {}", from, service))?;

        info!(
            "Cloned version {} of service {} into version {}",
            from, service, version
        );

        self.wait_until_writable(service, version).await?;
        self.resolved(service, version, Some(from));

        Ok(WorkingVersion::Cloned { version, from })
    }

    fn resolved(&self, service: &ServiceId, version: VersionNumber, cloned_from: Option<VersionNumber>) {
        self.events.emit(ReconcileEvent::VersionResolved {
            service_id: service.clone(),
            version,
            cloned_from,
        });
    }

    // Fixed delay first, then bounded readiness polling. A failed poll counts
    // as "not ready yet" rather than aborting.
    async fn wait_until_writable(&self, service: &ServiceId, version: VersionNumber) -> Result<()> {
        if !self.settle.initial_delay.is_zero() {
            debug!(
                "Waiting {:?} for version {} of service {} to settle",
                self.settle.initial_delay, version, service
            );
            sleep(self.settle.initial_delay).await;
        }

        let attempts = self.settle.poll_attempts;
        if attempts == 0 {
            return Ok(());
        }

        for attempt in 1..=attempts {
            match self.api.get_version(service, version).await {
                Ok(info) if info.is_writable() => {
                    debug!(
                        "Version {} of service {} writable after {} poll(s)",
                        version, service, attempt
                    );
                    return Ok(());
                }
                Ok(info) => {
                    debug!(
                        "Version {} of service {} not writable yet (active: {}, locked: {})",
                        version, service, info.active, info.locked
                    );
                }
                Err(e) => {
                    warn!(
                        "Readiness poll {} for version {} of service {} failed: {}",
                        attempt, version, service, e
                    );
                }
            }

            if attempt < attempts {
                sleep(self.settle.poll_interval).await;
            }
        }

        Err(Error::VersionNotReady {
            service_id: service.clone(),
            version,
            attempts,
        })
    }

    /// Run remote validation and return its verdict unchanged
    pub async fn validate(&self, service: &ServiceId, version: VersionNumber) -> Result<Validation> {
        self.api
            .validate_version(service, version)
            .await
            .with_context(|| format!("validating version {} of service {}", version, service))
    }

    /// Validate and turn a negative verdict into [`Error::Validation`]
    ///
    /// The remote message is carried verbatim.
    pub async fn ensure_valid(&self, service: &ServiceId, version: VersionNumber) -> Result<()> {
        let validation = self.validate(service, version).await?;
        if validation.valid {
            return Ok(());
        }

        warn!(
            "Version {} of service {} failed validation: {}",
            version, service, validation.message
        );
        self.events.emit(ReconcileEvent::ValidationFailed {
            service_id: service.clone(),
            version,
            message: validation.message.clone(),
        });

        Err(Error::Validation {
            service_id: service.clone(),
            version,
            message: validation.message,
        })
    }

    /// Promote a validated draft to active
    pub async fn activate(&self, service: &ServiceId, version: VersionNumber) -> Result<()> {
        self.api
            .activate_version(service, version)
            .await
            .with_context(|| format!("activating version {} of service {}", version, service))?;

        info!("Activated version {} of service {}", version, service);
        self.events.emit(ReconcileEvent::Activated {
            service_id: service.clone(),
            version,
        });
        Ok(())
    }

    /// Demote the active version, if there is one
    ///
    /// Returns whether a deactivation call was made.
    pub async fn deactivate(
        &self,
        service: &ServiceId,
        active: Option<VersionNumber>,
    ) -> Result<bool> {
        let Some(version) = active else {
            debug!("Service {} has no active version to deactivate", service);
            return Ok(false);
        };

        self.api
            .deactivate_version(service, version)
            .await
            .with_context(|| format!("deactivating version {} of service {}", version, service))?;

        info!("Deactivated version {} of service {}", version, service);
        self.events.emit(ReconcileEvent::Deactivated {
            service_id: service.clone(),
            version,
        });
        Ok(true)
    }
}
