//! Cache Entry Module
//!
//! Defines a prepared folder payload and its age bookkeeping.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

// == Folder Item ==
/// One entry of the flattened folder tree, ordered by relative path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FolderItem {
    pub relative_path: String,
    pub is_directory: bool,
    pub size: u64,
    /// Modification time, seconds since the Unix epoch
    pub modified_time: Option<f64>,
}

// == Cache Entry ==
/// A folder turned into an upload-ready payload.
///
/// Entries are immutable once inserted; the store hands out shared
/// references and only ever removes them.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub cache_id: String,
    pub folder_structure: Vec<FolderItem>,
    /// Relative path -> base64 encoded file bytes
    pub file_contents: BTreeMap<String, String>,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Absolute path of the prepared folder
    pub source_path: String,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new entry stamped with the current time.
    pub fn new(
        cache_id: impl Into<String>,
        source_path: impl Into<String>,
        folder_structure: Vec<FolderItem>,
        file_contents: BTreeMap<String, String>,
    ) -> Self {
        Self {
            cache_id: cache_id.into(),
            folder_structure,
            file_contents,
            created_at: current_timestamp_ms(),
            source_path: source_path.into(),
        }
    }

    /// Overrides the creation timestamp.
    pub fn with_created_at(mut self, created_at: u64) -> Self {
        self.created_at = created_at;
        self
    }

    // == Age ==
    /// Milliseconds elapsed between creation and `now_ms`.
    pub fn age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.created_at)
    }

    // == Is Expired ==
    /// Checks whether the entry has outlived `ttl_ms` at time `now_ms`.
    ///
    /// Boundary condition: an entry whose age equals the TTL is expired.
    pub fn is_expired_at(&self, ttl_ms: u64, now_ms: u64) -> bool {
        self.age_ms(now_ms) >= ttl_ms
    }

    /// Total number of base64 characters held by this entry.
    pub fn payload_len(&self) -> usize {
        self.file_contents.values().map(String::len).sum()
    }

    /// Creation time rendered as RFC 3339.
    pub fn created_at_rfc3339(&self) -> String {
        chrono::DateTime::<chrono::Utc>::from_timestamp_millis(self.created_at as i64)
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_default()
    }

    /// Checks that every cached file has a matching leaf in the folder tree.
    pub fn is_consistent(&self) -> bool {
        self.file_contents.keys().all(|path| {
            self.folder_structure
                .iter()
                .any(|item| !item.is_directory && &item.relative_path == path)
        })
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
