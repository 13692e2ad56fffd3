//! # Tana Connector
//!
//! Incremental Graph mail sync for Tana: delta queries with a persisted
//! cursor per folder, plus ad-hoc post-fetch filtering of the results.

pub mod cache;
pub mod config;
pub mod filters;
pub mod mail;
pub mod sync;

use cache::{CacheError, FileStateStore};
use config::{AppConfig, ConfigError};
use filters::FilterEngine;
use std::sync::Arc;
use sync::{DeltaSyncEngine, GraphDeltaClient, MailSyncService, SyncApiError};

/// Errors while wiring the service together
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("API client error: {0}")]
    Api(#[from] SyncApiError),
}

/// Initialize logger (once per process)
pub fn init_logging(level: &str) {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .try_init();
}

/// Build the sync service from configuration
pub fn build_service(config: &AppConfig, filters: FilterEngine) -> Result<MailSyncService, SetupError> {
    let store = FileStateStore::new(&config.delta_cache_dir)?;
    let client = GraphDeltaClient::with_token(&config.graph_base_url, config.access_token.clone())?;

    if !client.has_token() {
        log::warn!("GRAPH_ACCESS_TOKEN is not set; requests will be unauthenticated");
    }
    log::debug!("Delta cache directory: {}", store.root().display());

    let engine = DeltaSyncEngine::with_config(Arc::new(client), Arc::new(store), config.engine_config());
    Ok(MailSyncService::new(Arc::new(engine), filters))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_build_service_creates_cache_dir() {
        let dir = TempDir::new().unwrap();
        let cache_dir = dir.path().join("nested").join("delta_cache");
        let env: HashMap<&str, String> = HashMap::from([(
            "DELTA_CACHE_DIR",
            cache_dir.to_string_lossy().into_owned(),
        )]);
        let config = AppConfig::from_lookup(|key| env.get(key).cloned()).unwrap();

        let service = build_service(&config, FilterEngine::new()).unwrap();

        assert!(cache_dir.is_dir());
        assert!(service.describe("inbox").await.is_none());
    }
}
