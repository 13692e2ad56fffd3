//! Delta Sync Engine - one incremental sync cycle per call
//!
//! Coordinates the state store and the delta API:
//! - Initial vs. incremental mode from the cached cursor
//! - Sequential page loop following continuation links
//! - Tombstones returned inline with changed records
//! - Cursor committed only after the final page

use super::api::{DeltaApi, DeltaPage, PageLink, PageRequest, SyncApiError};
use super::models::{CursorCommit, SyncOptions, SyncOutcome, SyncRecord};
use crate::cache::{truncate_cursor, SyncStateStore};
use crate::mail::normalize_folder_id;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Engine tuning
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Deadline for each page fetch
    pub page_timeout: Duration,

    /// Upper bound on pages in one cycle
    pub max_pages: u32,

    /// Restart as an initial sync when the cached cursor is expired or unusable
    pub resync_on_expired: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            page_timeout: Duration::from_secs(30),
            max_pages: 1000,
            resync_on_expired: true,
        }
    }
}

/// Sync cycle errors. No cursor is committed for any of them.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Upstream API failed on page {page}: {source}")]
    Upstream {
        page: u32,
        #[source]
        source: SyncApiError,
    },

    #[error("Malformed page {page}: {reason}")]
    MalformedPage { page: u32, reason: String },

    #[error("Page {page} timed out after {after:?}")]
    Timeout { page: u32, after: Duration },

    #[error("Sync cancelled on page {page}")]
    Cancelled { page: u32 },

    #[error("Invalid folder id: {0:?}")]
    InvalidFolder(String),
}

impl SyncError {
    /// Page being fetched when the cycle aborted
    pub fn page(&self) -> Option<u32> {
        match self {
            SyncError::Upstream { page, .. }
            | SyncError::MalformedPage { page, .. }
            | SyncError::Timeout { page, .. }
            | SyncError::Cancelled { page } => Some(*page),
            SyncError::InvalidFolder(_) => None,
        }
    }

    /// The cached cursor was refused before any page came back
    fn is_rejected_cursor(&self) -> bool {
        matches!(
            self,
            SyncError::Upstream { page: 1, source }
                if source.is_expired_cursor() || source.is_unusable_link()
        )
    }
}

/// Accumulated result of a page loop
struct Cycle {
    records: Vec<SyncRecord>,
    pages_fetched: u32,
    final_cursor: String,
}

/// Delta sync engine
#[derive(Clone)]
pub struct DeltaSyncEngine {
    api: Arc<dyn DeltaApi>,
    store: Arc<dyn SyncStateStore>,
    config: EngineConfig,
}

impl DeltaSyncEngine {
    /// Create new engine with default config
    pub fn new(api: Arc<dyn DeltaApi>, store: Arc<dyn SyncStateStore>) -> Self {
        Self::with_config(api, store, EngineConfig::default())
    }

    pub fn with_config(
        api: Arc<dyn DeltaApi>,
        store: Arc<dyn SyncStateStore>,
        config: EngineConfig,
    ) -> Self {
        Self { api, store, config }
    }

    pub fn store(&self) -> &Arc<dyn SyncStateStore> {
        &self.store
    }

    /// Run one full sync cycle for a folder
    pub async fn sync(&self, folder_id: &str, options: &SyncOptions) -> Result<SyncOutcome, SyncError> {
        let folder_id = normalize_folder_id(folder_id);
        if folder_id.is_empty() {
            return Err(SyncError::InvalidFolder(folder_id));
        }

        let initial = PageRequest::Initial {
            folder_id: folder_id.clone(),
            select: options.select.clone(),
            page_size: options.page_size,
        };

        let cached = if options.use_cache {
            self.store.get(&folder_id).await
        } else {
            log::debug!("Cache lookup bypassed for folder '{}'", folder_id);
            None
        };

        let (cycle, is_initial_sync) = match cached {
            Some(cursor) => {
                log::info!(
                    "Incremental sync of '{}' from cursor {}",
                    folder_id,
                    truncate_cursor(&cursor, 48)
                );
                let resume = PageRequest::Link {
                    url: cursor,
                    page_size: options.page_size,
                };
                match self.run_cycle(resume, options).await {
                    Err(err) if self.config.resync_on_expired && err.is_rejected_cursor() => {
                        log::warn!("Cached cursor for '{}' rejected ({}), performing full resync", folder_id, err);
                        (self.run_cycle(initial, options).await?, true)
                    }
                    result => (result?, false),
                }
            }
            None => {
                log::info!("Initial sync of '{}'", folder_id);
                (self.run_cycle(initial, options).await?, true)
            }
        };

        // Last chance to honour a cancellation before anything is persisted
        if options.cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
            return Err(SyncError::Cancelled {
                page: cycle.pages_fetched,
            });
        }

        let cursor_commit = if options.write_cache {
            match self.store.put(&folder_id, &cycle.final_cursor).await {
                Ok(()) => CursorCommit::Committed,
                Err(e) => {
                    log::warn!("Sync of '{}' succeeded but cursor was not cached: {}", folder_id, e);
                    CursorCommit::Failed(e.to_string())
                }
            }
        } else {
            CursorCommit::Skipped
        };

        let outcome = SyncOutcome {
            records: cycle.records,
            is_initial_sync,
            pages_fetched: cycle.pages_fetched,
            cursor_commit,
        };

        log::info!(
            "Synced '{}': {} records ({} removed) in {} pages, initial={}, cursor={:?}",
            folder_id,
            outcome.records.len(),
            outcome.tombstone_count(),
            outcome.pages_fetched,
            outcome.is_initial_sync,
            outcome.cursor_commit
        );

        Ok(outcome)
    }

    /// Follow continuation links until a page carries the final cursor
    async fn run_cycle(&self, first: PageRequest, options: &SyncOptions) -> Result<Cycle, SyncError> {
        let mut request = first;
        let mut records = Vec::new();
        let mut pages_fetched = 0u32;

        loop {
            if pages_fetched >= self.config.max_pages {
                return Err(SyncError::MalformedPage {
                    page: pages_fetched + 1,
                    reason: format!("pagination did not end within {} pages", self.config.max_pages),
                });
            }
            pages_fetched += 1;

            let page = self
                .fetch_page(&request, pages_fetched, options.cancel.as_ref())
                .await?;

            let item_count = page.items.len();
            for item in page.items {
                let record = SyncRecord::from_value(item).map_err(|reason| SyncError::MalformedPage {
                    page: pages_fetched,
                    reason,
                })?;
                records.push(record);
            }

            match page.link {
                PageLink::Next(url) => {
                    log::debug!("Page {}: {} items, more pending", pages_fetched, item_count);
                    request = PageRequest::Link {
                        url,
                        page_size: options.page_size,
                    };
                }
                PageLink::Final(final_cursor) => {
                    log::debug!("Page {}: {} items, final", pages_fetched, item_count);
                    return Ok(Cycle {
                        records,
                        pages_fetched,
                        final_cursor,
                    });
                }
            }
        }
    }

    /// Fetch one page under the page deadline and the cancellation token
    async fn fetch_page(
        &self,
        request: &PageRequest,
        page: u32,
        cancel: Option<&CancellationToken>,
    ) -> Result<DeltaPage, SyncError> {
        let fetch = tokio::time::timeout(self.config.page_timeout, self.api.fetch_page(request));

        let result = match cancel {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => return Err(SyncError::Cancelled { page }),
                result = fetch => result,
            },
            None => fetch.await,
        };

        match result {
            Ok(Ok(page_data)) => Ok(page_data),
            Ok(Err(source)) => Err(SyncError::Upstream { page, source }),
            Err(_) => Err(SyncError::Timeout {
                page,
                after: self.config.page_timeout,
            }),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheError, MemoryStateStore, SyncStateInfo};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Delta API fake replaying scripted pages and recording requests
    #[derive(Default)]
    struct ScriptedApi {
        pages: Mutex<VecDeque<Result<DeltaPage, SyncApiError>>>,
        requests: Mutex<Vec<PageRequest>>,
    }

    impl ScriptedApi {
        fn push_next(&self, items: Vec<Value>, next: &str) {
            self.pages.lock().unwrap().push_back(Ok(DeltaPage {
                items,
                link: PageLink::Next(next.to_string()),
            }));
        }

        fn push_final(&self, items: Vec<Value>, cursor: &str) {
            self.pages.lock().unwrap().push_back(Ok(DeltaPage {
                items,
                link: PageLink::Final(cursor.to_string()),
            }));
        }

        fn push_error(&self, error: SyncApiError) {
            self.pages.lock().unwrap().push_back(Err(error));
        }

        fn requests(&self) -> Vec<PageRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DeltaApi for ScriptedApi {
        async fn fetch_page(&self, request: &PageRequest) -> Result<DeltaPage, SyncApiError> {
            self.requests.lock().unwrap().push(request.clone());
            self.pages
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(SyncApiError::NetworkError("script exhausted".into())))
        }
    }

    /// Delta API fake that never answers
    struct StalledApi;

    #[async_trait]
    impl DeltaApi for StalledApi {
        async fn fetch_page(&self, _request: &PageRequest) -> Result<DeltaPage, SyncApiError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Err(SyncApiError::NetworkError("unreachable".into()))
        }
    }

    /// Delta API fake that cancels the sync while answering with the final page
    struct CancelOnFinalApi {
        token: CancellationToken,
    }

    #[async_trait]
    impl DeltaApi for CancelOnFinalApi {
        async fn fetch_page(&self, _request: &PageRequest) -> Result<DeltaPage, SyncApiError> {
            self.token.cancel();
            Ok(DeltaPage {
                items: vec![json!({"id": "m1"})],
                link: PageLink::Final("C1".into()),
            })
        }
    }

    /// Store whose writes always fail
    struct ReadOnlyStore {
        inner: MemoryStateStore,
    }

    #[async_trait]
    impl SyncStateStore for ReadOnlyStore {
        async fn get(&self, folder_id: &str) -> Option<String> {
            self.inner.get(folder_id).await
        }
        async fn put(&self, _folder_id: &str, _cursor: &str) -> Result<(), CacheError> {
            Err(CacheError::Io {
                path: "/read-only/inbox.json".into(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            })
        }
        async fn clear(&self, folder_id: &str) -> Result<bool, CacheError> {
            self.inner.clear(folder_id).await
        }
        async fn clear_all(&self) -> Result<usize, CacheError> {
            self.inner.clear_all().await
        }
        async fn describe(&self, folder_id: &str) -> Option<SyncStateInfo> {
            self.inner.describe(folder_id).await
        }
    }

    fn msg(id: &str) -> Value {
        json!({"id": id, "subject": format!("Message {}", id), "isRead": false})
    }

    fn removed(id: &str) -> Value {
        json!({"id": id, "@removed": {"reason": "deleted"}})
    }

    fn setup() -> (Arc<ScriptedApi>, MemoryStateStore, DeltaSyncEngine) {
        let api = Arc::new(ScriptedApi::default());
        let store = MemoryStateStore::new();
        let engine = DeltaSyncEngine::new(api.clone(), Arc::new(store.clone()));
        (api, store, engine)
    }

    fn ids(outcome: &SyncOutcome) -> Vec<&str> {
        outcome.records.iter().map(|r| r.id()).collect()
    }

    #[tokio::test]
    async fn test_initial_sync_commits_final_cursor() {
        let (api, store, engine) = setup();
        api.push_final(vec![msg("m1")], "C1");

        let outcome = engine.sync("inbox", &SyncOptions::default()).await.unwrap();

        assert!(outcome.is_initial_sync);
        assert_eq!(outcome.pages_fetched, 1);
        assert!(outcome.new_cursor_cached());
        assert_eq!(store.get("inbox").await.as_deref(), Some("C1"));
        assert!(matches!(api.requests()[0], PageRequest::Initial { .. }));
    }

    #[tokio::test]
    async fn test_multi_page_sync_accumulates_in_order() {
        let (api, store, engine) = setup();
        api.push_next(vec![msg("m1"), msg("m2")], "N1");
        api.push_next(vec![msg("m3")], "N2");
        api.push_final(vec![], "C3");

        let outcome = engine.sync("inbox", &SyncOptions::default()).await.unwrap();

        assert_eq!(ids(&outcome), vec!["m1", "m2", "m3"]);
        assert_eq!(outcome.pages_fetched, 3);
        assert_eq!(store.get("inbox").await.as_deref(), Some("C3"));

        let requests = api.requests();
        assert_eq!(
            requests[1..],
            [
                PageRequest::Link { url: "N1".into(), page_size: None },
                PageRequest::Link { url: "N2".into(), page_size: None },
            ]
        );
    }

    #[tokio::test]
    async fn test_second_sync_resumes_from_committed_cursor() {
        let (api, _store, engine) = setup();
        api.push_final(vec![msg("m1"), msg("m2")], "C1");
        api.push_final(vec![], "C2");

        let first = engine.sync("inbox", &SyncOptions::default()).await.unwrap();
        let second = engine.sync("inbox", &SyncOptions::default()).await.unwrap();

        assert_eq!(first.records.len(), 2);
        assert!(!second.is_initial_sync);
        assert!(second.records.is_empty());
        assert_eq!(
            api.requests()[1],
            PageRequest::Link { url: "C1".into(), page_size: None }
        );
    }

    #[tokio::test]
    async fn test_failure_mid_pagination_keeps_previous_cursor() {
        let (api, store, engine) = setup();
        store.put("inbox", "C0").await.unwrap();

        api.push_next(vec![msg("m1")], "N1");
        api.push_next(vec![msg("m2")], "N2");
        api.push_error(SyncApiError::ServerError("503".into()));

        let err = engine.sync("inbox", &SyncOptions::default()).await.unwrap_err();

        assert!(matches!(err, SyncError::Upstream { page: 3, .. }));
        assert_eq!(store.get("inbox").await.as_deref(), Some("C0"));
    }

    #[tokio::test]
    async fn test_failure_on_initial_sync_commits_nothing() {
        let (api, store, engine) = setup();
        api.push_next(vec![msg("m1")], "N1");
        api.push_error(SyncApiError::Unauthorized);

        assert!(engine.sync("inbox", &SyncOptions::default()).await.is_err());
        assert!(store.get("inbox").await.is_none());
    }

    #[tokio::test]
    async fn test_tombstones_are_preserved_inline() {
        let (api, _store, engine) = setup();
        api.push_next(vec![msg("m1"), removed("m2")], "N1");
        api.push_final(vec![removed("m3"), msg("m4")], "C1");

        let outcome = engine.sync("inbox", &SyncOptions::default()).await.unwrap();

        assert_eq!(ids(&outcome), vec!["m1", "m2", "m3", "m4"]);
        let flags: Vec<bool> = outcome.records.iter().map(|r| r.is_tombstone()).collect();
        assert_eq!(flags, vec![false, true, true, false]);
        assert_eq!(outcome.tombstone_count(), 2);
    }

    #[tokio::test]
    async fn test_bypass_cache_still_refreshes_cursor() {
        let (api, store, engine) = setup();
        store.put("inbox", "C0").await.unwrap();
        api.push_final(vec![msg("m1")], "C1");

        let options = SyncOptions {
            use_cache: false,
            ..SyncOptions::default()
        };
        let outcome = engine.sync("inbox", &options).await.unwrap();

        assert!(outcome.is_initial_sync);
        assert!(matches!(api.requests()[0], PageRequest::Initial { .. }));
        assert_eq!(store.get("inbox").await.as_deref(), Some("C1"));
    }

    #[tokio::test]
    async fn test_cache_writes_can_be_disabled() {
        let (api, store, engine) = setup();
        api.push_final(vec![msg("m1")], "C1");

        let options = SyncOptions {
            use_cache: false,
            write_cache: false,
            ..SyncOptions::default()
        };
        let outcome = engine.sync("inbox", &options).await.unwrap();

        assert_eq!(outcome.cursor_commit, CursorCommit::Skipped);
        assert!(!outcome.new_cursor_cached());
        assert!(store.get("inbox").await.is_none());
    }

    #[tokio::test]
    async fn test_cache_write_failure_still_returns_records() {
        let api = Arc::new(ScriptedApi::default());
        api.push_final(vec![msg("m1")], "C1");
        let store = Arc::new(ReadOnlyStore {
            inner: MemoryStateStore::new(),
        });
        let engine = DeltaSyncEngine::new(api, store);

        let outcome = engine.sync("inbox", &SyncOptions::default()).await.unwrap();

        assert_eq!(outcome.records.len(), 1);
        assert!(matches!(outcome.cursor_commit, CursorCommit::Failed(ref reason) if reason.contains("read-only")));
    }

    #[tokio::test]
    async fn test_initial_request_carries_hints() {
        let (api, _store, engine) = setup();
        api.push_next(vec![], "N1");
        api.push_final(vec![], "C1");

        let options = SyncOptions {
            select: vec!["subject".into(), "categories".into()],
            page_size: Some(25),
            ..SyncOptions::default()
        };
        engine.sync("Inbox", &options).await.unwrap();

        let requests = api.requests();
        assert_eq!(
            requests[0],
            PageRequest::Initial {
                folder_id: "inbox".into(),
                select: vec!["subject".into(), "categories".into()],
                page_size: Some(25),
            }
        );
        assert_eq!(requests[1], PageRequest::Link { url: "N1".into(), page_size: Some(25) });
    }

    #[tokio::test]
    async fn test_well_known_folder_names_share_cache_key() {
        let (api, store, engine) = setup();
        api.push_final(vec![], "C1");

        engine.sync("INBOX", &SyncOptions::default()).await.unwrap();

        assert_eq!(store.get("inbox").await.as_deref(), Some("C1"));
        assert_eq!(store.describe("inbox").await.unwrap().folder_id, "inbox");
    }

    #[tokio::test]
    async fn test_expired_cursor_triggers_full_resync() {
        let (api, store, engine) = setup();
        store.put("inbox", "STALE").await.unwrap();
        api.push_error(SyncApiError::Gone("syncStateNotFound".into()));
        api.push_final(vec![msg("m1")], "C1");

        let outcome = engine.sync("inbox", &SyncOptions::default()).await.unwrap();

        assert!(outcome.is_initial_sync);
        assert_eq!(outcome.pages_fetched, 1);
        assert_eq!(store.get("inbox").await.as_deref(), Some("C1"));
        let requests = api.requests();
        assert_eq!(requests[0], PageRequest::Link { url: "STALE".into(), page_size: None });
        assert!(matches!(requests[1], PageRequest::Initial { .. }));
    }

    #[tokio::test]
    async fn test_expired_cursor_without_resync_is_an_error() {
        let api = Arc::new(ScriptedApi::default());
        let store = MemoryStateStore::new();
        store.put("inbox", "STALE").await.unwrap();
        api.push_error(SyncApiError::Gone("syncStateNotFound".into()));
        let engine = DeltaSyncEngine::with_config(
            api,
            Arc::new(store.clone()),
            EngineConfig {
                resync_on_expired: false,
                ..EngineConfig::default()
            },
        );

        let err = engine.sync("inbox", &SyncOptions::default()).await.unwrap_err();

        assert!(matches!(err, SyncError::Upstream { page: 1, source: SyncApiError::Gone(_) }));
        assert_eq!(store.get("inbox").await.as_deref(), Some("STALE"));
    }

    #[tokio::test]
    async fn test_malformed_item_aborts_cycle() {
        let (api, store, engine) = setup();
        api.push_next(vec![msg("m1")], "N1");
        api.push_final(vec![json!({"subject": "no id"})], "C1");

        let err = engine.sync("inbox", &SyncOptions::default()).await.unwrap_err();

        assert!(matches!(err, SyncError::MalformedPage { page: 2, .. }));
        assert!(store.get("inbox").await.is_none());
    }

    #[tokio::test]
    async fn test_endless_pagination_is_capped() {
        let api = Arc::new(ScriptedApi::default());
        for i in 0..5 {
            api.push_next(vec![], &format!("N{}", i));
        }
        let store = MemoryStateStore::new();
        let engine = DeltaSyncEngine::with_config(
            api,
            Arc::new(store.clone()),
            EngineConfig {
                max_pages: 3,
                ..EngineConfig::default()
            },
        );

        let err = engine.sync("inbox", &SyncOptions::default()).await.unwrap_err();

        assert!(matches!(err, SyncError::MalformedPage { page: 4, .. }));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_page_timeout_aborts_cycle() {
        let store = MemoryStateStore::new();
        let engine = DeltaSyncEngine::with_config(
            Arc::new(StalledApi),
            Arc::new(store.clone()),
            EngineConfig {
                page_timeout: Duration::from_millis(50),
                ..EngineConfig::default()
            },
        );

        let err = engine.sync("inbox", &SyncOptions::default()).await.unwrap_err();

        assert!(matches!(err, SyncError::Timeout { page: 1, .. }));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_cancellation_aborts_in_flight_fetch() {
        let store = MemoryStateStore::new();
        let engine = DeltaSyncEngine::new(Arc::new(StalledApi), Arc::new(store.clone()));
        let token = CancellationToken::new();
        let options = SyncOptions {
            cancel: Some(token.clone()),
            ..SyncOptions::default()
        };

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel();
        });

        let err = engine.sync("inbox", &options).await.unwrap_err();
        canceller.await.unwrap();

        assert!(matches!(err, SyncError::Cancelled { page: 1 }));
        assert_eq!(err.page(), Some(1));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_unusable_cursor_triggers_full_resync() {
        for error in [
            SyncApiError::InvalidLink("relative URL without a base".into()),
            SyncApiError::ForeignLink("https://elsewhere.example.com".into()),
        ] {
            let (api, store, engine) = setup();
            store.put("inbox", "garbage").await.unwrap();
            api.push_error(error);
            api.push_final(vec![msg("m1")], "C1");

            let outcome = engine.sync("inbox", &SyncOptions::default()).await.unwrap();

            assert!(outcome.is_initial_sync);
            assert_eq!(ids(&outcome), vec!["m1"]);
            assert_eq!(store.get("inbox").await.as_deref(), Some("C1"));
            assert!(matches!(api.requests()[1], PageRequest::Initial { .. }));
        }
    }

    #[tokio::test]
    async fn test_invalid_next_link_is_not_retried() {
        let (api, store, engine) = setup();
        store.put("inbox", "C0").await.unwrap();
        api.push_next(vec![msg("m1")], "N1");
        api.push_error(SyncApiError::ForeignLink("https://elsewhere.example.com".into()));

        let err = engine.sync("inbox", &SyncOptions::default()).await.unwrap_err();

        assert!(matches!(err, SyncError::Upstream { page: 2, source: SyncApiError::ForeignLink(_) }));
        assert_eq!(api.requests().len(), 2);
        assert_eq!(store.get("inbox").await.as_deref(), Some("C0"));
    }

    #[tokio::test]
    async fn test_cancelled_after_final_page_persists_nothing() {
        let token = CancellationToken::new();
        let store = MemoryStateStore::new();
        store.put("inbox", "https://graph.example.com/delta?$deltatoken=C0").await.unwrap();
        let engine = DeltaSyncEngine::new(
            Arc::new(CancelOnFinalApi { token: token.clone() }),
            Arc::new(store.clone()),
        );

        let options = SyncOptions {
            cancel: Some(token),
            ..SyncOptions::default()
        };
        let err = engine.sync("inbox", &options).await.unwrap_err();

        assert!(matches!(err, SyncError::Cancelled { page: 1 }));
        assert_eq!(
            store.get("inbox").await.as_deref(),
            Some("https://graph.example.com/delta?$deltatoken=C0")
        );
    }

    #[tokio::test]
    async fn test_cancelled_before_first_fetch_persists_nothing() {
        let (api, store, engine) = setup();
        api.push_final(vec![msg("m1")], "C1");
        let token = CancellationToken::new();
        token.cancel();

        let options = SyncOptions {
            cancel: Some(token),
            ..SyncOptions::default()
        };
        let err = engine.sync("inbox", &options).await.unwrap_err();

        assert!(matches!(err, SyncError::Cancelled { .. }));
        assert!(store.get("inbox").await.is_none());
    }

    #[tokio::test]
    async fn test_blank_folder_is_rejected() {
        let (api, _store, engine) = setup();
        let err = engine.sync("  ", &SyncOptions::default()).await.unwrap_err();
        assert!(matches!(err, SyncError::InvalidFolder(_)));
        assert!(api.requests().is_empty());
    }
}
