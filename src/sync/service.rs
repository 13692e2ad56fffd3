//! Mail sync service - delta sync plus post-fetch filtering
//!
//! The only place where the sync engine and the filter engine meet.

use super::engine::{DeltaSyncEngine, SyncError};
use super::models::{CursorCommit, SyncOptions, SyncRecord};
use crate::cache::{CacheError, SyncStateInfo, SyncStateStore};
use crate::filters::{FilterEngine, FilterError, MatchLogic};
use crate::mail::normalize_folder_id;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// One sync request as issued by a front end
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailSyncQuery {
    pub folder_id: String,
    #[serde(default)]
    pub select: Vec<String>,
    pub filter: Option<String>,
    #[serde(default)]
    pub match_logic: MatchLogic,
    pub page_size: Option<u32>,
    #[serde(default = "default_true")]
    pub use_cache: bool,
    #[serde(default = "default_true")]
    pub write_cache: bool,
}

fn default_true() -> bool {
    true
}

impl MailSyncQuery {
    pub fn new(folder_id: impl Into<String>) -> Self {
        Self {
            folder_id: folder_id.into(),
            use_cache: true,
            write_cache: true,
            ..Self::default()
        }
    }
}

/// Filtered result of a sync cycle
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MailSyncResponse {
    pub folder_id: String,
    pub records: Vec<SyncRecord>,
    /// Records before filtering
    pub total_changes: usize,
    pub is_initial_sync: bool,
    pub pages_fetched: u32,
    pub new_cursor_cached: bool,
    /// Set when the cycle succeeded but the cursor could not be stored
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_warning: Option<String>,
}

/// Service errors
#[derive(Debug, thiserror::Error)]
pub enum MailSyncError {
    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("Invalid filter expression: {0}")]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Facade over the delta engine and the filter engine
#[derive(Clone)]
pub struct MailSyncService {
    engine: Arc<DeltaSyncEngine>,
    filters: FilterEngine,
}

impl MailSyncService {
    pub fn new(engine: Arc<DeltaSyncEngine>, filters: FilterEngine) -> Self {
        Self { engine, filters }
    }

    pub fn engine(&self) -> &DeltaSyncEngine {
        &self.engine
    }

    fn store(&self) -> &Arc<dyn SyncStateStore> {
        self.engine.store()
    }

    /// Sync a folder and filter the changes
    pub async fn sync(&self, query: &MailSyncQuery) -> Result<MailSyncResponse, MailSyncError> {
        self.sync_with_cancel(query, None).await
    }

    pub async fn sync_with_cancel(
        &self,
        query: &MailSyncQuery,
        cancel: Option<CancellationToken>,
    ) -> Result<MailSyncResponse, MailSyncError> {
        // Reject a bad filter before any network traffic
        if let Some(expr) = query.filter.as_deref() {
            self.filters.compile(expr)?;
        }

        let options = SyncOptions {
            select: query.select.clone(),
            page_size: query.page_size,
            use_cache: query.use_cache,
            write_cache: query.write_cache,
            cancel,
        };

        let outcome = self.engine.sync(&query.folder_id, &options).await?;
        let new_cursor_cached = outcome.new_cursor_cached();
        let cache_warning = match outcome.cursor_commit {
            CursorCommit::Failed(reason) => Some(format!("sync cursor was not cached: {}", reason)),
            CursorCommit::Committed | CursorCommit::Skipped => None,
        };

        let total_changes = outcome.records.len();
        let records = self
            .filters
            .apply(outcome.records, query.filter.as_deref(), query.match_logic)?;

        Ok(MailSyncResponse {
            folder_id: normalize_folder_id(&query.folder_id),
            records,
            total_changes,
            is_initial_sync: outcome.is_initial_sync,
            pages_fetched: outcome.pages_fetched,
            new_cursor_cached,
            cache_warning,
        })
    }

    /// Cached state for a folder
    pub async fn describe(&self, folder_id: &str) -> Option<SyncStateInfo> {
        self.store().describe(&normalize_folder_id(folder_id)).await
    }

    /// Forget a folder's cursor so the next sync is a full one
    pub async fn clear(&self, folder_id: &str) -> Result<bool, MailSyncError> {
        Ok(self.store().clear(&normalize_folder_id(folder_id)).await?)
    }

    pub async fn clear_all(&self) -> Result<usize, MailSyncError> {
        Ok(self.store().clear_all().await?)
    }
}
