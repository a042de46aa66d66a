//! Reconciliation engine
//!
//! The [`Reconciler`] converges a remote service onto a declared
//! [`ServiceConfig`]:
//! - Comparing the new declaration with the previous one
//! - Choosing a writable version (initial draft, leftover draft or settled
//!   clone)
//! - Applying settings and sub-resource differences to that draft
//! - Validating, then activating the draft
//! - Reading back the observed state
//!
//! ## Architecture
//!
//! ```text
//!                  ┌──────────────┐
//!   ServiceConfig ─│  Reconciler  │── ReconcileEvent ──▶ (observer)
//!                  └──────────────┘
//!                         │
//!     ┌─────────────┬─────┴───────┬──────────────┬──────────────┐
//!     ▼             ▼             ▼              ▼              ▼
//! ┌──────────┐ ┌──────────┐ ┌────────────┐ ┌───────────┐ ┌────────────┐
//! │ Versions │ │ Settings │ │Subresources│ │  Reader   │ │  Teardown  │
//! └──────────┘ └──────────┘ └────────────┘ └───────────┘ └────────────┘
//!     │             │             │              │              │
//!     └─────────────┴─────────────┴──────┬───────┴──────────────┘
//!                                        ▼
//!                                 ┌────────────┐
//!                                 │   CdnApi   │
//!                                 └────────────┘
//! ```
//!
//! ## Flow of one attempt
//!
//! 1. Fetch the service record (name, active version)
//! 2. Rename in place if only the name differs
//! 3. Otherwise resolve a working version, write settings if they changed,
//!    remove then add domains, remove then add backends
//! 4. Validate; a negative verdict stops before activation
//! 5. Activate
//! 6. Re-read the service, whichever path was taken
//!
//! Every step is fail-fast. Nothing is retried and nothing is rolled back:
//! a failure leaves an inactive draft behind, while the previously active
//! version keeps serving.

pub mod differ;
pub mod events;
pub mod reader;
pub mod settings;
pub mod subresources;
pub mod teardown;
pub mod versions;

pub use differ::{SetDiff, diff};
pub use events::{ReconcileEvent, ReconcilePhase, SubresourceKind};
pub use reader::StateReader;
pub use settings::SettingsSync;
pub use subresources::{Subresource, SubresourceSync, SyncReport};
pub use teardown::DeletionController;
pub use versions::{VersionManager, WorkingVersion};

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::error::{Result, ResultExt};
use crate::model::{ServiceConfig, ServiceId, ServiceRecord, ServiceSnapshot, VersionNumber};
use crate::traits::CdnApi;
use events::EventSink;

/// Comment attached to services created by the reconciler
pub const MANAGED_COMMENT: &str = "Managed by cdnsync";

/// Which parts of a declaration differ from the previous one
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Display name
    pub name: bool,
    /// Default host (compared after collapsing "" to unset)
    pub default_host: bool,
    /// Default TTL
    pub default_ttl: bool,
    /// Domain set
    pub domains: bool,
    /// Backend set
    pub backends: bool,
}

impl ChangeSet {
    /// Compare two declarations
    ///
    /// With no previous declaration, every versioned part counts as changed
    /// so a new service always gets its first version activated.
    pub fn between(previous: Option<&ServiceConfig>, desired: &ServiceConfig) -> Self {
        match previous {
            None => ChangeSet {
                name: false,
                default_host: true,
                default_ttl: true,
                domains: true,
                backends: true,
            },
            Some(previous) => {
                let old = previous.settings.normalized();
                let new = desired.settings.normalized();
                ChangeSet {
                    name: previous.name != desired.name,
                    default_host: old.default_host != new.default_host,
                    default_ttl: old.default_ttl != new.default_ttl,
                    domains: previous.domains != desired.domains,
                    backends: previous.backends != desired.backends,
                }
            }
        }
    }

    /// Whether the settings need to be written
    pub fn settings(&self) -> bool {
        self.default_host || self.default_ttl
    }

    /// Whether a new version has to be created and activated
    pub fn needs_version(&self) -> bool {
        self.settings() || self.domains || self.backends
    }

    /// Whether the declarations are equivalent
    pub fn is_empty(&self) -> bool {
        !self.name && !self.needs_version()
    }
}

/// What a reconciliation attempt did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// No remote mutation
    Unchanged,
    /// Only the display name was updated; no new version
    Renamed,
    /// A new version was validated and activated
    Activated {
        /// The now-active version
        version: VersionNumber,
    },
}

/// Result of a successful create or update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    /// What was done
    pub outcome: ReconcileOutcome,
    /// Observed state after the attempt
    pub observed: ServiceSnapshot,
}

/// Converges remote services onto declared configurations
///
/// ## Lifecycle
///
/// 1. Create with [`Reconciler::new()`], keep or drop the event receiver
/// 2. Call [`create`](Reconciler::create), [`read`](Reconciler::read),
///    [`update`](Reconciler::update) or [`delete`](Reconciler::delete)
///
/// ## Concurrency
///
/// Attempts against the same service must not overlap; the remote system
/// offers no locking and two concurrent clones would race on activation.
/// Different services can be reconciled concurrently.
pub struct Reconciler {
    api: Arc<dyn CdnApi>,
    versions: VersionManager,
    subresources: SubresourceSync,
    settings: SettingsSync,
    reader: StateReader,
    teardown: DeletionController,
    events: EventSink,
}

impl Reconciler {
    /// Create a reconciler over an API client
    ///
    /// # Parameters
    ///
    /// - `api`: Remote API client
    /// - `config`: Settle policy and event channel capacity
    ///
    /// # Returns
    ///
    /// The reconciler and the receiving end of its event channel. Dropping
    /// the receiver disables events without affecting reconciliation.
    pub fn new(
        api: Arc<dyn CdnApi>,
        config: &EngineConfig,
    ) -> Result<(Self, mpsc::Receiver<ReconcileEvent>)> {
        config.validate()?;

        let (event_tx, event_rx) = mpsc::channel(config.event_channel_capacity);
        let events = EventSink::new(event_tx);

        let versions = VersionManager::new(api.clone(), config.settle_policy(), events.clone());
        let reconciler = Self {
            subresources: SubresourceSync::new(api.clone(), events.clone()),
            settings: SettingsSync::new(api.clone(), events.clone()),
            reader: StateReader::new(api.clone()),
            teardown: DeletionController::new(api.clone(), versions.clone(), events.clone()),
            versions,
            events,
            api,
        };

        Ok((reconciler, event_rx))
    }

    /// Name of the underlying provider
    pub fn provider_name(&self) -> &'static str {
        self.api.provider_name()
    }

    /// Create a service and converge it onto `desired`
    ///
    /// The service starts with an inactive version 1 which receives the full
    /// declaration and is then validated and activated. The new id is in
    /// `observed.id`. Callers that must not lose the id when the first
    /// rollout fails use [`create_service`](Reconciler::create_service) and
    /// [`configure_new`](Reconciler::configure_new) instead.
    pub async fn create(&self, desired: &ServiceConfig) -> Result<Reconciliation> {
        let record = self.create_service(desired).await?;
        self.configure_new(&record.id, desired).await
    }

    /// Create the remote service only, leaving version 1 an empty draft
    ///
    /// A failed [`configure_new`](Reconciler::configure_new) can be retried
    /// with [`update`](Reconciler::update) against an empty declaration; the
    /// draft is then diffed against what it already holds.
    pub async fn create_service(&self, desired: &ServiceConfig) -> Result<ServiceRecord> {
        desired.validate()?;

        let record = self
            .api
            .create_service(&desired.name, MANAGED_COMMENT)
            .await
            .with_context(|| format!("creating service {}", desired.name))?;

        info!("Created service {} ({})", record.name, record.id);
        Ok(record)
    }

    /// First rollout of a service returned by
    /// [`create_service`](Reconciler::create_service)
    pub async fn configure_new(
        &self,
        service: &ServiceId,
        desired: &ServiceConfig,
    ) -> Result<Reconciliation> {
        desired.validate()?;
        self.reconcile(service, None, desired)
            .await
            .with_context(|| format!("configuring new service {}", service))
    }

    /// Observed state of a service
    pub async fn read(&self, service: &ServiceId) -> Result<ServiceSnapshot> {
        self.reader.read(service).await
    }

    /// Converge an existing service from `previous` onto `desired`
    ///
    /// `previous` is the last declaration that was applied; change detection
    /// compares against it, not against the remote state.
    pub async fn update(
        &self,
        service: &ServiceId,
        previous: &ServiceConfig,
        desired: &ServiceConfig,
    ) -> Result<Reconciliation> {
        desired.validate()?;
        self.reconcile(service, Some(previous), desired).await
    }

    /// Delete a service, deactivating its active version first when `force`
    pub async fn delete(&self, service: &ServiceId, force: bool) -> Result<()> {
        self.teardown.delete(service, force).await
    }

    async fn reconcile(
        &self,
        service: &ServiceId,
        previous: Option<&ServiceConfig>,
        desired: &ServiceConfig,
    ) -> Result<Reconciliation> {
        self.events.phase(service, ReconcilePhase::Idle);

        let record = self
            .api
            .get_service(service)
            .await
            .with_context(|| format!("fetching service {}", service))?;

        let changes = ChangeSet::between(previous, desired);
        debug!("Changes for service {}: {:?}", service, changes);

        if changes.name {
            self.api
                .update_service(service, &desired.name)
                .await
                .with_context(|| format!("renaming service {} to {}", service, desired.name))?;

            info!("Renamed service {} to {}", service, desired.name);
            self.events.emit(ReconcileEvent::Renamed {
                service_id: service.clone(),
                name: desired.name.clone(),
            });
        }

        let outcome = if changes.needs_version() {
            let version = self.roll_out(&record, previous, desired, &changes).await?;
            ReconcileOutcome::Activated { version }
        } else if changes.name {
            ReconcileOutcome::Renamed
        } else {
            debug!("Service {} unchanged", service);
            self.events.phase(service, ReconcilePhase::Unchanged);
            self.events.emit(ReconcileEvent::Unchanged {
                service_id: service.clone(),
            });
            ReconcileOutcome::Unchanged
        };

        let observed = self.reader.read(service).await?;
        Ok(Reconciliation { outcome, observed })
    }

    async fn roll_out(
        &self,
        record: &ServiceRecord,
        previous: Option<&ServiceConfig>,
        desired: &ServiceConfig,
        changes: &ChangeSet,
    ) -> Result<VersionNumber> {
        let service = &record.id;

        self.events.phase(service, ReconcilePhase::Cloning);
        let working = match previous {
            None => self.versions.initial_draft(service),
            Some(_) => self.versions.resolve_working_version(record).await?,
        };
        let version = working.number();

        self.events.phase(service, ReconcilePhase::Updating);

        // A reused draft may already hold part of a declaration, so it is
        // diffed against its own contents
        let empty;
        let contents;
        let (baseline, write_settings) = match (working, previous) {
            (WorkingVersion::Draft { version }, _) => {
                contents = self.reader.read_version(service, version).await?;
                let settings = ChangeSet::between(Some(&contents), desired).settings();
                (&contents, settings)
            }
            (_, Some(previous)) => (previous, changes.settings()),
            (_, None) => {
                empty = ServiceConfig::new(desired.name.clone());
                (&empty, changes.settings())
            }
        };

        if write_settings {
            self.settings
                .apply(service, version, &desired.settings)
                .await?;
        }
        self.subresources
            .sync_all(service, version, baseline, desired)
            .await?;

        self.events.phase(service, ReconcilePhase::Validating);
        self.versions.ensure_valid(service, version).await?;

        self.events.phase(service, ReconcilePhase::Activating);
        self.versions.activate(service, version).await?;

        self.events.phase(service, ReconcilePhase::Done);
        Ok(version)
    }
}
