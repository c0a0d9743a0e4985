// # File Document Store
//
// File-based implementation of DocumentStore with crash recovery.
//
// ## Purpose
//
// Persists primary and audit records across restarts so that baselines
// recorded before a restart are still found by later updates.
//
// ## Crash Recovery
//
// - Atomic writes: Uses write-then-rename for atomicity
// - Corruption detection: Validates JSON on load
// - Automatic backup: Keeps .backup of last known good state
// - Recovery: Falls back to backup if corruption detected
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "collections": {
//     "audit_logs_meta": {
//       "9f0c...": {
//         "_id": "9f0c...",
//         "document_current_state": { "_id": "41ab...", "name": "Alice" },
//         "version": 0
//       }
//     }
//   }
// }
// ```

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use super::{Collections, find_in, insert_into, update_in};
use crate::context::RequestContext;
use crate::error::{Error, Result};
use crate::model::DocumentId;
use crate::traits::document_store::{DocumentStore, Filter, Record};

/// Store file format version
/// Used for future migration if format changes
const STORE_FILE_VERSION: &str = "1.0";

/// File-based document store with crash recovery
///
/// Every mutation rewrites the whole file atomically; this is meant for
/// small deployments and tests, not as a database.
///
/// # Example
///
/// ```rust,no_run
/// use docaudit_core::{DocumentStore, FileDocumentStore, RequestContext};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileDocumentStore::new("/var/lib/docaudit/store.json").await?;
///     let ctx = RequestContext::new();
///
///     let mut record = serde_json::Map::new();
///     record.insert("name".into(), "Alice".into());
///     store.insert_one(&ctx, "users", record).await?;
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileDocumentStore {
    path: PathBuf,
    state: Arc<RwLock<Collections>>,
}

/// Serializable store file format
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct StoreFileFormat {
    version: String,
    collections: Collections,
}

impl FileDocumentStore {
    /// Create or load a file document store
    ///
    /// This will:
    /// 1. Try to load the existing store file
    /// 2. If corruption detected, try to load from backup
    /// 3. If both fail, start empty
    /// 4. Create parent directories if needed
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    Error::config(format!(
                        "Failed to create store directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let collections = Self::load_with_recovery(&path).await?;

        Ok(Self {
            path,
            state: Arc::new(RwLock::new(collections)),
        })
    }

    /// Load collections from file with automatic recovery
    ///
    /// Recovery strategy:
    /// 1. Try to load main store file
    /// 2. If it is corrupt, try loading backup
    /// 3. If backup also fails, start empty
    async fn load_with_recovery(path: &Path) -> Result<Collections> {
        let err = match Self::load(path).await {
            Ok(collections) => {
                tracing::debug!("Loaded store from file: {} collections", collections.len());
                return Ok(collections);
            }
            Err(e) => e,
        };

        // Anything other than corruption (e.g. permissions) is fatal
        if !matches!(err, Error::InvalidData(_)) {
            return Err(err);
        }

        tracing::warn!(
            "Store file appears corrupted: {}. Attempting recovery from backup.",
            err
        );

        let backup_path = Self::backup_path(path);
        if !backup_path.exists() {
            tracing::warn!("No backup file found. Starting with empty store.");
            return Ok(Collections::new());
        }

        match Self::load(&backup_path).await {
            Ok(collections) => {
                tracing::info!(
                    "Recovered store from backup: {} collections",
                    collections.len()
                );

                if let Err(restore_err) = Self::restore_from_backup(path, &backup_path).await {
                    tracing::error!(
                        "Failed to restore store file from backup: {}",
                        restore_err
                    );
                }

                Ok(collections)
            }
            Err(backup_err) => {
                tracing::error!(
                    "Backup also corrupted: {}. Starting with empty store.",
                    backup_err
                );
                Ok(Collections::new())
            }
        }
    }

    /// Load collections from file
    async fn load(path: &Path) -> Result<Collections> {
        if !path.exists() {
            tracing::debug!("Store file does not exist: {}", path.display());
            return Ok(Collections::new());
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            Error::store(format!(
                "Failed to read store file {}: {}",
                path.display(),
                e
            ))
        })?;

        let store_file: StoreFileFormat = serde_json::from_str(&content).map_err(|e| {
            Error::invalid_data(format!(
                "Failed to parse store file {}: {}",
                path.display(),
                e
            ))
        })?;

        if store_file.version != STORE_FILE_VERSION {
            tracing::warn!(
                "Store file version mismatch: expected {}, got {}. \
                Attempting to load anyway.",
                STORE_FILE_VERSION,
                store_file.version
            );
        }

        Ok(store_file.collections)
    }

    /// Write collections to file atomically
    ///
    /// Called with the write lock held so concurrent mutations serialize
    /// their file writes in the same order as their in-memory changes.
    async fn write(&self, collections: &Collections) -> Result<()> {
        let store_file = StoreFileFormat {
            version: STORE_FILE_VERSION.to_string(),
            collections: collections.clone(),
        };

        let json = serde_json::to_string_pretty(&store_file)
            .map_err(|e| Error::store(format!("Failed to serialize store: {}", e)))?;

        let temp_path = self.temp_path();
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::store(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.write_all(json.as_bytes()).await.map_err(|e| {
                Error::store(format!(
                    "Failed to write to temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.flush().await.map_err(|e| {
                Error::store(format!(
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
            Error::store(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        tracing::trace!("Store written to file: {}", self.path.display());
        Ok(())
    }

    /// Restore store file from backup
    async fn restore_from_backup(path: &Path, backup_path: &Path) -> Result<()> {
        fs::copy(backup_path, path).await.map_err(|e| {
            Error::store(format!(
                "Failed to restore from backup {} to {}: {}",
                backup_path.display(),
                path.display(),
                e
            ))
        })?;

        tracing::info!("Restored store file from backup");
        Ok(())
    }

    /// Get path to temporary file for atomic writes
    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    /// Get path to backup file
    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }
}

#[async_trait]
impl DocumentStore for FileDocumentStore {
    async fn find_one(
        &self,
        ctx: &RequestContext,
        collection: &str,
        filter: &Filter,
    ) -> Result<Record> {
        ctx.check()?;
        let guard = self.state.read().await;
        find_in(&guard, collection, filter)
    }

    async fn insert_one(
        &self,
        ctx: &RequestContext,
        collection: &str,
        record: Record,
    ) -> Result<DocumentId> {
        ctx.check()?;
        let mut guard = self.state.write().await;
        let id = insert_into(&mut guard, collection, record)?;

        // Immediate write for durability
        if let Err(e) = self.write(&guard).await {
            if let Some(records) = guard.get_mut(collection) {
                records.remove(&id);
            }
            return Err(e);
        }
        Ok(id)
    }

    async fn update_by_id(
        &self,
        ctx: &RequestContext,
        collection: &str,
        id: &DocumentId,
        changes: Record,
    ) -> Result<()> {
        ctx.check()?;
        let mut guard = self.state.write().await;
        let previous = guard
            .get(collection)
            .and_then(|records| records.get(id))
            .cloned();
        update_in(&mut guard, collection, id, changes)?;

        // Immediate write for durability
        if let Err(e) = self.write(&guard).await {
            if let (Some(records), Some(previous)) = (guard.get_mut(collection), previous) {
                records.insert(*id, previous);
            }
            return Err(e);
        }
        Ok(())
    }
}
