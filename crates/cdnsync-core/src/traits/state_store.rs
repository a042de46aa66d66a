// # State Store Trait
//
// Defines the interface for remembering what was last declared.
//
// ## Purpose
//
// The reconciler decides whether a new version is needed by comparing the
// desired configuration against the *last declared* one, not against live
// remote state. A lifecycle driver therefore has to keep, per managed
// resource:
// - The remote service id
// - The declaration that was last applied successfully
// - The version that declaration activated
//
// ## Implementations
//
// - `MemoryStateStore`: tests and one-shot embedding
// - `FileStateStore`: JSON file with atomic writes and backup recovery

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::{ServiceConfig, ServiceId, VersionNumber};

/// State record for one managed service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateRecord {
    /// Remote service id
    pub service_id: ServiceId,
    /// Declaration last applied successfully
    pub declared: ServiceConfig,
    /// Version activated by that declaration
    pub active_version: Option<VersionNumber>,
    /// Timestamp of the last successful apply
    pub last_applied: chrono::DateTime<chrono::Utc>,
}

impl StateRecord {
    /// Create a record stamped with the current time
    pub fn new(
        service_id: ServiceId,
        declared: ServiceConfig,
        active_version: Option<VersionNumber>,
    ) -> Self {
        Self {
            service_id,
            declared,
            active_version,
            last_applied: chrono::Utc::now(),
        }
    }
}

/// Trait for state store implementations
///
/// # Thread Safety
///
/// All methods must be safe to call concurrently from multiple tasks.
///
/// # Implementation Guidelines
///
/// - **Async I/O only**: never block the runtime
/// - **Explicit flush**: `flush()` must persist all pending changes
/// - **No business logic**: the store never decides what to reconcile
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Get the record for a managed resource
    ///
    /// # Returns
    ///
    /// - `Ok(Some(StateRecord))`: The stored record
    /// - `Ok(None)`: Resource not managed yet
    /// - `Err(Error)`: Storage error
    async fn get_record(&self, resource: &str) -> Result<Option<StateRecord>, crate::Error>;

    /// Create or replace the record for a managed resource
    async fn set_record(&self, resource: &str, record: &StateRecord)
    -> Result<(), crate::Error>;

    /// Delete a record (no error if it didn't exist)
    async fn delete_record(&self, resource: &str) -> Result<(), crate::Error>;

    /// List all resource names in the store
    async fn list_records(&self) -> Result<Vec<String>, crate::Error>;

    /// Persist any pending changes
    async fn flush(&self) -> Result<(), crate::Error>;
}
