//! Response DTOs for the tool surface
//!
//! Defines the uniform envelope and the operation-specific payloads that get
//! flattened into it.

use std::collections::BTreeMap;
use std::fmt::Display;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::cache::FolderItem;
use crate::error::{Result, ToolError};
use crate::tools::{DirectoryNode, SkippedFile};

// == Envelope ==
/// Uniform response shape: `{"success": bool, ...fields..., "error"?: string}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub success: bool,
    /// Present only when `success` is false
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Operation-specific fields
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Envelope {
    /// Wraps a payload that serializes to a JSON object.
    pub fn ok<T: Serialize>(payload: T) -> Result<Self> {
        match serde_json::to_value(payload)? {
            Value::Object(fields) => Ok(Self {
                success: true,
                error: None,
                fields,
            }),
            Value::Null => Ok(Self {
                success: true,
                error: None,
                fields: Map::new(),
            }),
            other => Err(ToolError::Internal(format!(
                "tool payload must be an object, got {}",
                other
            ))),
        }
    }

    /// Builds a failed envelope carrying the error message.
    pub fn failure(err: impl Display) -> Self {
        Self {
            success: false,
            error: Some(err.to_string()),
            fields: Map::new(),
        }
    }

    /// Folds a tool result into an envelope. Errors never escape this point.
    pub fn from_result<T: Serialize>(result: Result<T>) -> Self {
        match result.and_then(Self::ok) {
            Ok(envelope) => envelope,
            Err(err) => Self::failure(err),
        }
    }

    /// Reads an envelope back out of a JSON value, if it has the shape.
    pub fn from_value(value: &Value) -> Option<Self> {
        value.get("success")?.as_bool()?;
        serde_json::from_value(value.clone()).ok()
    }

    pub fn into_value(self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|err| {
            serde_json::json!({ "success": false, "error": err.to_string() })
        })
    }
}

// == Tool Payloads ==

/// Summary returned by `prepare_local_folder`.
#[derive(Debug, Clone, Serialize)]
pub struct PrepareSummary {
    pub total_files: usize,
    /// Bytes copied into the cache
    pub total_size: u64,
    pub total_size_mb: f64,
    pub skipped_files: usize,
    /// First entries of the skip list only
    pub skipped_details: Vec<SkippedFile>,
    pub source_path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PrepareFolderResponse {
    pub cache_id: String,
    pub summary: PrepareSummary,
}

/// Payload of `get_cached_data`, borrowed straight from the cache entry.
#[derive(Debug, Serialize)]
pub struct CachedDataResponse<'a> {
    pub cache_id: &'a str,
    pub source_path: &'a str,
    pub created_at: String,
    pub folder_structure: &'a [FolderItem],
    pub file_contents: &'a BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExploreResponse {
    pub tree: DirectoryNode,
    pub base_path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReadFileResponse {
    pub content: String,
    /// Encoding actually used; `base64` after a decode fallback
    pub encoding: String,
    pub size: u64,
    /// Modification time, seconds since the Unix epoch
    pub modified: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CredentialsResponse {
    /// Unmasked file content
    pub credentials_text: String,
    pub source_path: String,
    pub provider_hint: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SaveDownloadResponse {
    pub saved_path: String,
    pub size: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClearCacheResponse {
    pub message: String,
    pub removed: usize,
    pub active_caches: usize,
}

// == Service Endpoints ==

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Number of successful cache retrievals
    pub hits: u64,
    /// Number of lookups for ids never issued or already removed
    pub misses: u64,
    /// Number of entries evicted for exceeding the TTL
    pub expirations: u64,
    /// Current number of entries in cache
    pub total_entries: usize,
    /// Hit rate (hits / all lookups)
    pub hit_rate: f64,
}

impl StatsResponse {
    /// Creates a new StatsResponse from cache statistics
    pub fn new(hits: u64, misses: u64, expirations: u64, total_entries: usize) -> Self {
        let total_requests = hits + misses + expirations;
        let hit_rate = if total_requests > 0 {
            hits as f64 / total_requests as f64
        } else {
            0.0
        };
        Self {
            hits,
            misses,
            expirations,
            total_entries,
            hit_rate,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// `local` or `proxy`
    pub mode: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy(mode: impl Into<String>) -> Self {
        Self {
            status: "healthy".to_string(),
            mode: mode.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}
