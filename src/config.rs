//! Application configuration
//!
//! Read from the environment (and a `.env` file when present).

use crate::sync::api::DEFAULT_BASE_URL;
use crate::sync::EngineConfig;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_PAGE_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_PAGES: u32 = 1000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

/// Runtime configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Graph API root, e.g. `https://graph.microsoft.com/v1.0`
    pub graph_base_url: String,

    /// Bearer token; acquiring it is outside this crate
    pub access_token: Option<String>,

    /// Directory holding one sync state file per folder
    pub delta_cache_dir: PathBuf,

    pub page_timeout: Duration,
    pub max_pages: u32,
    pub log_level: String,
}

impl AppConfig {
    /// Load `.env` (if any) and read the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let graph_base_url = get("GRAPH_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        url::Url::parse(&graph_base_url).map_err(|e| ConfigError::InvalidValue {
            key: "GRAPH_BASE_URL",
            reason: e.to_string(),
        })?;

        let page_timeout_secs = match get("PAGE_TIMEOUT_SECS") {
            Some(raw) => parse_positive::<u64>("PAGE_TIMEOUT_SECS", &raw)?,
            None => DEFAULT_PAGE_TIMEOUT_SECS,
        };
        let max_pages = match get("MAX_PAGES") {
            Some(raw) => parse_positive::<u32>("MAX_PAGES", &raw)?,
            None => DEFAULT_MAX_PAGES,
        };

        Ok(Self {
            graph_base_url,
            access_token: get("GRAPH_ACCESS_TOKEN"),
            delta_cache_dir: get("DELTA_CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(default_cache_dir),
            page_timeout: Duration::from_secs(page_timeout_secs),
            max_pages,
            log_level: get("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            page_timeout: self.page_timeout,
            max_pages: self.max_pages,
            ..EngineConfig::default()
        }
    }
}

fn parse_positive<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + Default,
    T::Err: std::fmt::Display,
{
    let value = raw.parse::<T>().map_err(|e| ConfigError::InvalidValue {
        key,
        reason: e.to_string(),
    })?;
    if value <= T::default() {
        return Err(ConfigError::InvalidValue {
            key,
            reason: format!("must be greater than zero, got {}", raw),
        });
    }
    Ok(value)
}

fn default_cache_dir() -> PathBuf {
    match directories::ProjectDirs::from("com", "tana", "tana-connector") {
        Some(dirs) => dirs.data_dir().join("delta_cache"),
        None => {
            log::warn!("Could not determine data directory, using ./delta_cache");
            PathBuf::from("delta_cache")
        }
    }
}
