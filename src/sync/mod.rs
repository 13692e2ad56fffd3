//! Sync Module - Incremental Mail Synchronization
//!
//! Provides delta sync of mail folders against the Graph API:
//! - Initial sync (every current item) or incremental sync (changes since
//!   the cached cursor)
//! - Multi-page fetch following continuation links
//! - Tombstones for deleted items, returned inline
//! - Cursor persisted only after a complete cycle
//!
//! Architecture:
//! - `api`: the remote delta protocol (trait + reqwest client)
//! - `engine`: one sync cycle, cursor commit boundary
//! - `service`: engine output run through the filter engine

pub mod api;
pub mod engine;
pub mod models;
pub mod service;


// Re-export commonly used types
pub use api::{DeltaApi, DeltaPage, GraphDeltaClient, PageLink, PageRequest, SyncApiError};
pub use engine::{DeltaSyncEngine, EngineConfig, SyncError};
pub use models::{CursorCommit, SyncOptions, SyncOutcome, SyncRecord, Tombstone, TOMBSTONE_KEY};
pub use service::{MailSyncError, MailSyncQuery, MailSyncResponse, MailSyncService};
