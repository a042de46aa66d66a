// # Memory State Store
//
// In-memory implementation of StateStore.
//
// Nothing survives a restart: the next apply after a crash treats every
// resource as unmanaged and creates a new service. Use it for tests and for
// embedding where the caller keeps the declarations itself.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::traits::state_store::{StateRecord, StateStore};

/// In-memory state store implementation
///
/// # Example
///
/// ```rust,no_run
/// use cdnsync_core::state::MemoryStateStore;
/// use cdnsync_core::traits::{StateRecord, StateStore};
/// use cdnsync_core::{ServiceConfig, ServiceId};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryStateStore::new();
///     let record = StateRecord::new(ServiceId::new("abc"), ServiceConfig::new("web"), None);
///     store.set_record("web", &record).await?;
///
///     let stored = store.get_record("web").await?;
///     assert_eq!(stored.map(|r| r.service_id), Some(ServiceId::new("abc")));
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    inner: Arc<RwLock<HashMap<String, StateRecord>>>,
}

impl MemoryStateStore {
    /// Create a new empty memory state store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of records in the store
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get_record(&self, resource: &str) -> Result<Option<StateRecord>, Error> {
        Ok(self.inner.read().await.get(resource).cloned())
    }

    async fn set_record(&self, resource: &str, record: &StateRecord) -> Result<(), Error> {
        self.inner
            .write()
            .await
            .insert(resource.to_string(), record.clone());
        Ok(())
    }

    async fn delete_record(&self, resource: &str) -> Result<(), Error> {
        self.inner.write().await.remove(resource);
        Ok(())
    }

    async fn list_records(&self) -> Result<Vec<String>, Error> {
        Ok(self.inner.read().await.keys().cloned().collect())
    }

    async fn flush(&self) -> Result<(), Error> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ServiceConfig, ServiceId, VersionNumber};

    fn record(id: &str) -> StateRecord {
        StateRecord::new(
            ServiceId::new(id),
            ServiceConfig::new("web"),
            Some(VersionNumber::new(2)),
        )
    }

    #[tokio::test]
    async fn test_memory_store_basic() {
        let store = MemoryStateStore::new();
        assert!(store.is_empty().await);

        store.set_record("web", &record("abc")).await.unwrap();
        assert_eq!(store.len().await, 1);

        let stored = store.get_record("web").await.unwrap().unwrap();
        assert_eq!(stored.service_id, ServiceId::new("abc"));
        assert_eq!(stored.active_version, Some(VersionNumber::new(2)));

        store.delete_record("web").await.unwrap();
        assert!(store.get_record("web").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_store_list() {
        let store = MemoryStateStore::new();
        store.set_record("web", &record("abc")).await.unwrap();
        store.set_record("api", &record("def")).await.unwrap();

        let mut names = store.list_records().await.unwrap();
        names.sort();
        assert_eq!(names, vec!["api".to_string(), "web".to_string()]);
    }
}
