//! Sync state cache - persisted delta cursors per mail folder
//!
//! Provides durable storage for the resumption cursor of each folder:
//! - One JSON file per folder (no global lock, folders never interfere)
//! - Atomic overwrite (temp file + rename)
//! - Self-healing reads (corrupt or unreadable state counts as a miss)
//! - Thread-safe async operations

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

const STATE_FILE_EXTENSION: &str = "json";

/// Persisted sync state for a single folder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStateInfo {
    /// Opaque cursor issued by the remote API
    #[serde(alias = "delta_link")]
    pub cursor: String,

    /// When the last full sync cycle completed
    pub updated_at: DateTime<Utc>,

    /// Folder the cursor belongs to
    pub folder_id: String,
}

/// Cache errors (write path only, reads never fail)
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize sync state: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Invalid folder id: {0:?}")]
    InvalidFolderId(String),
}

/// Storage for per-folder sync cursors
#[async_trait]
pub trait SyncStateStore: Send + Sync {
    /// Cached cursor for a folder, `None` on a miss or unreadable state
    async fn get(&self, folder_id: &str) -> Option<String>;

    /// Replace the cursor for a folder, stamping the current time
    async fn put(&self, folder_id: &str, cursor: &str) -> Result<(), CacheError>;

    /// Remove the cursor for a folder; returns whether anything was removed
    async fn clear(&self, folder_id: &str) -> Result<bool, CacheError>;

    /// Remove every cached cursor; returns the number removed
    async fn clear_all(&self) -> Result<usize, CacheError>;

    /// Full stored state, for diagnostics
    async fn describe(&self, folder_id: &str) -> Option<SyncStateInfo>;
}

/// Filesystem-safe key for a folder id.
///
/// Path separators are replaced so arbitrary ids cannot escape the cache root.
pub fn storage_key(folder_id: &str) -> String {
    folder_id.replace(['/', '\\'], "_")
}

fn validate_folder_id(folder_id: &str) -> Result<(), CacheError> {
    if folder_id.trim().is_empty() {
        return Err(CacheError::InvalidFolderId(folder_id.to_string()));
    }
    Ok(())
}

// ============================================================================
// Filesystem store
// ============================================================================

/// Sync state store backed by one JSON file per folder
#[derive(Debug, Clone)]
pub struct FileStateStore {
    root: PathBuf,
}

impl FileStateStore {
    /// Open (and create if needed) a cache directory
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|source| CacheError::Io {
            path: root.clone(),
            source,
        })?;
        Ok(Self { root })
    }

    /// Cache directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn state_path(&self, folder_id: &str) -> PathBuf {
        self.root
            .join(format!("{}.{}", storage_key(folder_id), STATE_FILE_EXTENSION))
    }

    async fn read_state(&self, folder_id: &str) -> Option<SyncStateInfo> {
        let path = self.state_path(folder_id);

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                log::warn!("Failed to read sync state {}: {}, treating as miss", path.display(), e);
                return None;
            }
        };

        match serde_json::from_slice::<SyncStateInfo>(&bytes) {
            Ok(state) if state.cursor.is_empty() => {
                log::warn!("Sync state {} has an empty cursor, treating as miss", path.display());
                None
            }
            // Distinct ids can share a sanitized file name
            Ok(state) if state.folder_id != folder_id => {
                log::debug!(
                    "Sync state {} belongs to folder '{}', not '{}'",
                    path.display(),
                    state.folder_id,
                    folder_id
                );
                None
            }
            Ok(state) => Some(state),
            Err(e) => {
                log::warn!("Corrupted sync state {}: {}, treating as miss", path.display(), e);
                None
            }
        }
    }
}

#[async_trait]
impl SyncStateStore for FileStateStore {
    async fn get(&self, folder_id: &str) -> Option<String> {
        self.read_state(folder_id).await.map(|state| state.cursor)
    }

    async fn put(&self, folder_id: &str, cursor: &str) -> Result<(), CacheError> {
        validate_folder_id(folder_id)?;

        let state = SyncStateInfo {
            cursor: cursor.to_string(),
            updated_at: Utc::now(),
            folder_id: folder_id.to_string(),
        };
        let json = serde_json::to_vec_pretty(&state)?;

        let path = self.state_path(folder_id);
        let tmp_path = path.with_extension(format!("{}.tmp", STATE_FILE_EXTENSION));

        tokio::fs::write(&tmp_path, &json)
            .await
            .map_err(|source| CacheError::Io {
                path: tmp_path.clone(),
                source,
            })?;

        if let Err(source) = tokio::fs::rename(&tmp_path, &path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(CacheError::Io { path, source });
        }

        log::debug!("Saved sync state for folder '{}'", folder_id);
        Ok(())
    }

    async fn clear(&self, folder_id: &str) -> Result<bool, CacheError> {
        let path = self.state_path(folder_id);

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                log::info!("Cleared sync state for folder '{}'", folder_id);
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(source) => Err(CacheError::Io { path, source }),
        }
    }

    async fn clear_all(&self) -> Result<usize, CacheError> {
        let io_err = |source| CacheError::Io {
            path: self.root.clone(),
            source,
        };

        let mut entries = tokio::fs::read_dir(&self.root).await.map_err(io_err)?;
        let mut count = 0;

        while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(STATE_FILE_EXTENSION) {
                continue;
            }
            match tokio::fs::remove_file(&path).await {
                Ok(()) => count += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(source) => return Err(CacheError::Io { path, source }),
            }
        }

        log::info!("Cleared {} cached sync states", count);
        Ok(count)
    }

    async fn describe(&self, folder_id: &str) -> Option<SyncStateInfo> {
        self.read_state(folder_id).await
    }
}

// ============================================================================
// In-memory store
// ============================================================================

/// Volatile sync state store, keyed the same way as [`FileStateStore`]
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    states: Arc<Mutex<HashMap<String, SyncStateInfo>>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of folders with a cached cursor
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, SyncStateInfo>> {
        self.states.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl SyncStateStore for MemoryStateStore {
    async fn get(&self, folder_id: &str) -> Option<String> {
        self.describe(folder_id).await.map(|state| state.cursor)
    }

    async fn put(&self, folder_id: &str, cursor: &str) -> Result<(), CacheError> {
        validate_folder_id(folder_id)?;
        self.lock().insert(
            storage_key(folder_id),
            SyncStateInfo {
                cursor: cursor.to_string(),
                updated_at: Utc::now(),
                folder_id: folder_id.to_string(),
            },
        );
        Ok(())
    }

    async fn clear(&self, folder_id: &str) -> Result<bool, CacheError> {
        Ok(self.lock().remove(&storage_key(folder_id)).is_some())
    }

    async fn clear_all(&self) -> Result<usize, CacheError> {
        let mut states = self.lock();
        let count = states.len();
        states.clear();
        Ok(count)
    }

    async fn describe(&self, folder_id: &str) -> Option<SyncStateInfo> {
        self.lock()
            .get(&storage_key(folder_id))
            .filter(|state| state.folder_id == folder_id)
            .cloned()
    }
}

/// Shorten a cursor for display; cursors can carry access capabilities
pub fn truncate_cursor(cursor: &str, max_chars: usize) -> String {
    if cursor.chars().count() <= max_chars {
        return cursor.to_string();
    }
    let head: String = cursor.chars().take(max_chars).collect();
    format!("{}...", head)
}
