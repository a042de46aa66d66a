// # File State Store
//
// File-based implementation of StateStore with crash recovery.
//
// ## Crash Recovery
//
// - Atomic writes: write to `<path>.tmp`, then rename over the state file
// - Automatic backup: the previous file is copied to `<path>.backup` first
// - Recovery: a state file that fails to parse is replaced by its backup
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "records": {
//     "web": {
//       "service_id": "SU1Z0isxPaozGVKXdv0eY",
//       "declared": { "name": "web", "domains": [], "backends": [], "default_ttl": 3600, "force_destroy": false },
//       "active_version": 3,
//       "last_applied": "2025-01-09T12:00:00Z"
//     }
//   }
// }
// ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::Error;
use crate::traits::state_store::{StateRecord, StateStore};

/// State file format version
const STATE_FILE_VERSION: &str = "1.0";

/// File-based state store with crash recovery
///
/// Every mutation is written through to disk immediately.
///
/// # Example
///
/// ```rust,no_run
/// use cdnsync_core::state::FileStateStore;
/// use cdnsync_core::traits::StateStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileStateStore::new("/var/lib/cdnsync/state.json").await?;
///     for resource in store.list_records().await? {
///         println!("managing {resource}");
///     }
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileStateStore {
    path: PathBuf,
    state: Arc<RwLock<FileState>>,
}

#[derive(Debug)]
struct FileState {
    records: HashMap<String, StateRecord>,
    dirty: bool,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct StateFileFormat {
    version: String,
    records: HashMap<String, StateRecord>,
}

/// Why a state file could not be loaded
enum LoadError {
    /// File exists but is not valid state JSON
    Corrupted(Error),
    /// Any other failure (permissions, I/O)
    Other(Error),
}

impl FileStateStore {
    /// Create or load a file state store
    ///
    /// Creates parent directories if needed. A corrupted state file is
    /// recovered from its backup; if the backup is unusable too the store
    /// starts empty.
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::config(format!(
                    "Failed to create state directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let records = Self::load_state_with_recovery(&path).await?;

        Ok(Self {
            path,
            state: Arc::new(RwLock::new(FileState {
                records,
                dirty: false,
            })),
        })
    }

    async fn load_state_with_recovery(path: &Path) -> Result<HashMap<String, StateRecord>, Error> {
        let corruption = match Self::load_state(path).await {
            Ok(records) => {
                tracing::debug!("Loaded state from file: {} records", records.len());
                return Ok(records);
            }
            Err(LoadError::Other(e)) => return Err(e),
            Err(LoadError::Corrupted(e)) => e,
        };

        tracing::warn!(
            "State file appears corrupted: {}. Attempting recovery from backup.",
            corruption
        );

        let backup_path = Self::backup_path(path);
        if !backup_path.exists() {
            tracing::warn!("No backup file found. Starting with empty state.");
            return Ok(HashMap::new());
        }

        match Self::load_state(&backup_path).await {
            Ok(records) => {
                tracing::info!("Recovered state from backup: {} records", records.len());
                if let Err(e) = fs::copy(&backup_path, path).await {
                    tracing::error!("Failed to restore state file from backup: {}", e);
                }
                Ok(records)
            }
            Err(LoadError::Corrupted(e) | LoadError::Other(e)) => {
                tracing::error!("Backup also unusable: {}. Starting with empty state.", e);
                Ok(HashMap::new())
            }
        }
    }

    async fn load_state(path: &Path) -> Result<HashMap<String, StateRecord>, LoadError> {
        if !path.exists() {
            tracing::debug!("State file does not exist: {}", path.display());
            return Ok(HashMap::new());
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            LoadError::Other(Error::state_store(format!(
                "Failed to read state file {}: {}",
                path.display(),
                e
            )))
        })?;

        let state_file: StateFileFormat = serde_json::from_str(&content).map_err(|e| {
            LoadError::Corrupted(Error::state_store(format!(
                "Failed to parse state file {}: {}",
                path.display(),
                e
            )))
        })?;

        if state_file.version != STATE_FILE_VERSION {
            tracing::warn!(
                "State file version mismatch: expected {}, got {}. Attempting to load anyway.",
                STATE_FILE_VERSION,
                state_file.version
            );
        }

        Ok(state_file.records)
    }

    /// Write state to file atomically
    async fn write_state(&self) -> Result<(), Error> {
        let mut state_guard = self.state.write().await;

        let state_file = StateFileFormat {
            version: STATE_FILE_VERSION.to_string(),
            records: state_guard.records.clone(),
        };
        let json = serde_json::to_string_pretty(&state_file)
            .map_err(|e| Error::state_store(format!("Failed to serialize state: {}", e)))?;

        let temp_path = self.temp_path();
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::state_store(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
            file.write_all(json.as_bytes()).await.map_err(|e| {
                Error::state_store(format!(
                    "Failed to write to temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
            file.flush().await.map_err(|e| {
                Error::state_store(format!(
                    "Failed to flush temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        if self.path.exists() {
            let backup_path = Self::backup_path(&self.path);
            if let Err(e) = fs::copy(&self.path, &backup_path).await {
                tracing::warn!("Failed to create backup: {}", e);
            }
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::state_store(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        state_guard.dirty = false;
        tracing::trace!("State written to file: {}", self.path.display());
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn get_record(&self, resource: &str) -> Result<Option<StateRecord>, Error> {
        Ok(self.state.read().await.records.get(resource).cloned())
    }

    async fn set_record(&self, resource: &str, record: &StateRecord) -> Result<(), Error> {
        {
            let mut state_guard = self.state.write().await;
            state_guard
                .records
                .insert(resource.to_string(), record.clone());
            state_guard.dirty = true;
        }

        // Immediate write for durability
        self.write_state().await
    }

    async fn delete_record(&self, resource: &str) -> Result<(), Error> {
        {
            let mut state_guard = self.state.write().await;
            state_guard.records.remove(resource);
            state_guard.dirty = true;
        }

        self.write_state().await
    }

    async fn list_records(&self) -> Result<Vec<String>, Error> {
        Ok(self.state.read().await.records.keys().cloned().collect())
    }

    async fn flush(&self) -> Result<(), Error> {
        let dirty = self.state.read().await.dirty;
        if dirty {
            self.write_state().await
        } else {
            Ok(())
        }
    }
}
