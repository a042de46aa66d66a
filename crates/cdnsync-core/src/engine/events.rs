//! Events published while reconciling
//!
//! Events are informational: a full channel drops them with a warning and
//! reconciliation carries on.

use std::fmt;
use tokio::sync::mpsc;
use tracing::warn;

use crate::model::{ServiceId, VersionNumber};

/// Step of a reconciliation attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcilePhase {
    /// Fetching the service and comparing declarations
    Idle,
    /// Resolving the working version (clone + settle)
    Cloning,
    /// Applying settings and sub-resource changes to the draft
    Updating,
    /// Remote validation of the draft
    Validating,
    /// Promoting the draft to active
    Activating,
    /// New version active
    Done,
    /// Nothing to do
    Unchanged,
}

/// Kind of versioned sub-resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubresourceKind {
    /// Domain entry
    Domain,
    /// Backend entry
    Backend,
}

impl fmt::Display for SubresourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubresourceKind::Domain => f.write_str("domain"),
            SubresourceKind::Backend => f.write_str("backend"),
        }
    }
}

/// Events emitted by the Reconciler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileEvent {
    /// Attempt moved to a new phase
    PhaseChanged {
        service_id: ServiceId,
        phase: ReconcilePhase,
    },

    /// Working version chosen; `cloned_from` is `None` for the initial draft
    VersionResolved {
        service_id: ServiceId,
        version: VersionNumber,
        cloned_from: Option<VersionNumber>,
    },

    /// Default host / TTL written to the draft
    SettingsUpdated {
        service_id: ServiceId,
        version: VersionNumber,
    },

    /// Sub-resource deleted from the draft
    SubresourceRemoved {
        service_id: ServiceId,
        version: VersionNumber,
        kind: SubresourceKind,
        name: String,
    },

    /// Sub-resource created in the draft
    SubresourceAdded {
        service_id: ServiceId,
        version: VersionNumber,
        kind: SubresourceKind,
        name: String,
    },

    /// Remote validation rejected the draft
    ValidationFailed {
        service_id: ServiceId,
        version: VersionNumber,
        message: String,
    },

    /// Draft promoted to active
    Activated {
        service_id: ServiceId,
        version: VersionNumber,
    },

    /// Active version demoted before teardown
    Deactivated {
        service_id: ServiceId,
        version: VersionNumber,
    },

    /// Display name changed without a new version
    Renamed { service_id: ServiceId, name: String },

    /// Declaration matched the last one; no remote mutations
    Unchanged { service_id: ServiceId },

    /// Service deleted and confirmed absent
    Deleted { service_id: ServiceId },
}

/// Cloneable, non-blocking sender shared by the engine components
#[derive(Debug, Clone)]
pub(crate) struct EventSink {
    tx: mpsc::Sender<ReconcileEvent>,
}

impl EventSink {
    pub(crate) fn new(tx: mpsc::Sender<ReconcileEvent>) -> Self {
        Self { tx }
    }

    pub(crate) fn emit(&self, event: ReconcileEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            // Nobody listening; events are optional
            Err(mpsc::error::TrySendError::Closed(_)) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(
                    "Event channel full, dropping event. Consider increasing event_channel_capacity."
                );
            }
        }
    }

    pub(crate) fn phase(&self, service_id: &ServiceId, phase: ReconcilePhase) {
        self.emit(ReconcileEvent::PhaseChanged {
            service_id: service_id.clone(),
            phase,
        });
    }
}
