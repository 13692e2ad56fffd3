//! Sync Data Models
//!
//! Records returned by a delta cycle and the cycle's options and outcome.
//! Records keep the remote JSON shape verbatim; nothing is renamed or
//! flattened, so new upstream fields pass straight through.

use crate::filters::FieldSource;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

/// Reserved key marking a deleted item in a delta page
pub const TOMBSTONE_KEY: &str = "@removed";

// ============================================================================
// Sync Record
// ============================================================================

/// A changed (or deleted) item from one sync cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct SyncRecord {
    fields: Map<String, Value>,
}

/// Deletion marker carried by a tombstone record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tombstone {
    /// Provider reason, e.g. "deleted" or "changed"
    #[serde(default)]
    pub reason: Option<String>,
}

impl SyncRecord {
    /// Wrap a raw item, requiring an object with a string `id`
    pub fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::Object(fields) => Self::try_from(fields),
            other => Err(format!("expected an object, got {}", json_type(&other))),
        }
    }

    pub fn id(&self) -> &str {
        self.fields
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// Deletion marker, if this record is a tombstone
    pub fn tombstone(&self) -> Option<Tombstone> {
        self.fields.get(TOMBSTONE_KEY).map(|marker| Tombstone {
            reason: marker
                .get("reason")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }

    pub fn is_tombstone(&self) -> bool {
        self.fields.contains_key(TOMBSTONE_KEY)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn get(&self, path: &str) -> Option<&Value> {
        self.fields.field(path)
    }
}

impl TryFrom<Map<String, Value>> for SyncRecord {
    type Error = String;

    fn try_from(fields: Map<String, Value>) -> Result<Self, Self::Error> {
        match fields.get("id") {
            Some(Value::String(id)) if !id.is_empty() => Ok(Self { fields }),
            Some(other) => Err(format!("item id must be a non-empty string, got {}", json_type(other))),
            None => Err("item has no id".to_string()),
        }
    }
}

impl From<SyncRecord> for Map<String, Value> {
    fn from(record: SyncRecord) -> Self {
        record.fields
    }
}

impl FieldSource for SyncRecord {
    fn field(&self, path: &str) -> Option<&Value> {
        self.fields.field(path)
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// Sync Options & Outcome
// ============================================================================

/// Options for one sync cycle
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Fields to request on an initial sync (`$select`)
    pub select: Vec<String>,

    /// Preferred page size hint
    pub page_size: Option<u32>,

    /// Look up the cached cursor (false forces an initial sync)
    pub use_cache: bool,

    /// Persist the final cursor
    pub write_cache: bool,

    /// Aborts the in-flight page fetch when triggered
    pub cancel: Option<CancellationToken>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            select: Vec::new(),
            page_size: None,
            use_cache: true,
            write_cache: true,
            cancel: None,
        }
    }
}

/// What happened to the final cursor of a completed cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum CursorCommit {
    Committed,
    /// Cache writes were disabled for this cycle
    Skipped,
    /// Records are valid but the cursor could not be stored
    Failed(String),
}

/// Result of a completed sync cycle
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    /// Changed and deleted records, in page order
    pub records: Vec<SyncRecord>,
    pub is_initial_sync: bool,
    pub pages_fetched: u32,
    pub cursor_commit: CursorCommit,
}

impl SyncOutcome {
    pub fn new_cursor_cached(&self) -> bool {
        self.cursor_commit == CursorCommit::Committed
    }

    pub fn tombstone_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_tombstone()).count()
    }
}
