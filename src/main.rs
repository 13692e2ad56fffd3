//! Tana Connector CLI
//!
//! # Commands
//!
//! - `sync` - Delta sync a mail folder and print the (filtered) changes
//! - `describe` - Show the cached sync state of a folder
//! - `clear` - Forget a folder's cursor (next sync is a full one)
//! - `clear-all` - Forget every cached cursor

use clap::{Parser, Subcommand};
use serde_json::json;
use tana_connector::cache::truncate_cursor;
use tana_connector::config::AppConfig;
use tana_connector::filters::{FilterEngine, MatchLogic};
use tana_connector::sync::{MailSyncQuery, MailSyncService};
use tokio_util::sync::CancellationToken;

const CURSOR_DISPLAY_CHARS: usize = 60;

/// Incremental Graph mail sync with post-fetch filtering.
#[derive(Parser)]
#[command(name = "tana-connector")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level override (error, warn, info, debug, trace)
    #[arg(global = true, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync a folder and print the changes as JSON
    Sync {
        /// Folder id or well-known name (inbox, sentitems, ...)
        folder: String,

        /// Comma-separated fields to request on an initial sync
        #[arg(long, value_delimiter = ',')]
        select: Vec<String>,

        /// Filter expression, e.g. "categories:Work,isRead:eq:false"
        #[arg(short, long)]
        filter: Option<String>,

        /// Keep records matching any condition instead of all
        #[arg(long)]
        any: bool,

        /// Reject malformed filter clauses instead of ignoring them
        #[arg(long)]
        strict: bool,

        /// Preferred page size
        #[arg(long)]
        page_size: Option<u32>,

        /// Ignore the cached cursor (full resync)
        #[arg(long)]
        no_cache: bool,

        /// Do not store the new cursor
        #[arg(long)]
        no_cache_write: bool,
    },

    /// Show the cached sync state of a folder
    Describe {
        folder: String,
    },

    /// Forget a folder's cursor
    Clear {
        folder: String,
    },

    /// Forget every cached cursor
    ClearAll,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: {}", e);
            std::process::exit(2);
        }
    };
    tana_connector::init_logging(cli.log_level.as_deref().unwrap_or(&config.log_level));

    if let Err(e) = run(cli.command, &config).await {
        log::error!("{}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(command: Commands, config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let strict = matches!(command, Commands::Sync { strict: true, .. });
    let filters = if strict { FilterEngine::strict() } else { FilterEngine::new() };
    let service = tana_connector::build_service(config, filters)?;

    let output = match command {
        Commands::Sync {
            folder,
            select,
            filter,
            any,
            page_size,
            no_cache,
            no_cache_write,
            ..
        } => {
            let query = MailSyncQuery {
                select,
                filter,
                match_logic: MatchLogic::from_match_all(!any),
                page_size,
                use_cache: !no_cache,
                write_cache: !no_cache_write,
                ..MailSyncQuery::new(folder)
            };
            sync_until_interrupted(&service, &query).await?
        }
        Commands::Describe { folder } => match service.describe(&folder).await {
            Some(info) => json!({
                "folderId": info.folder_id,
                "cursor": truncate_cursor(&info.cursor, CURSOR_DISPLAY_CHARS),
                "updatedAt": info.updated_at.to_rfc3339(),
            }),
            None => json!({ "folderId": folder, "cached": false }),
        },
        Commands::Clear { folder } => {
            let cleared = service.clear(&folder).await?;
            json!({ "folderId": folder, "cleared": cleared })
        }
        Commands::ClearAll => {
            let count = service.clear_all().await?;
            json!({ "cleared": count })
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Run a sync, cancelling the in-flight request on Ctrl-C
async fn sync_until_interrupted(
    service: &MailSyncService,
    query: &MailSyncQuery,
) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, aborting sync");
            on_signal.cancel();
        }
    });

    let result = service.sync_with_cancel(query, Some(cancel)).await;
    watcher.abort();

    let response = result?;
    if let Some(warning) = &response.cache_warning {
        log::warn!("{}", warning);
    }
    Ok(serde_json::to_value(&response)?)
}
