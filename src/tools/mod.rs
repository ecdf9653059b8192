//! Local Tools Module
//!
//! File inspection, folder preparation and credential loading, exposed as
//! named tools through an explicit registry.
//!
//! # Tools
//! - `prepare_local_folder` / `get_cached_data` / `clear_cache` - payload cache
//! - `explore_directory` - depth-bounded tree view
//! - `read_local_file` / `save_download_locally` - single file transfer
//! - `validate_dataset` / `create_config_template` - dataset inspection
//! - `read_credentials` - credential file loading
//!
//! The registry also carries the `local_file_workflow` prompt.

pub mod credentials;
pub mod dataset;
pub mod explore;
pub mod files;
pub mod prepare;
pub mod registry;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cache::SharedCache;
use crate::error::{Result, ToolError};

pub use credentials::{mask_secrets, CredentialReader};
pub use explore::DirectoryNode;
pub use prepare::{SkipReason, SkippedFile};
pub use registry::ToolRegistry;

// == Tool Descriptor ==
/// Name, description and input schema of a tool, used for discovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "inputSchema", default)]
    pub input_schema: Value,
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }

    /// Fields listed under `required` in the input schema.
    pub fn required_fields(&self) -> Vec<&str> {
        self.input_schema
            .get("required")
            .and_then(Value::as_array)
            .map(|fields| fields.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// Checks that every required field is present and not null.
    ///
    /// This is the only schema enforcement performed; types are left to
    /// argument deserialization.
    pub fn check_required(&self, arguments: &Value) -> Result<()> {
        let missing: Vec<&str> = self
            .required_fields()
            .into_iter()
            .filter(|field| arguments.get(*field).map_or(true, Value::is_null))
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ToolError::InvalidRequest(format!(
                "missing required argument(s) for {}: {}",
                self.name,
                missing.join(", ")
            )))
        }
    }
}

// == Prompt Descriptor ==
/// Name and description of a prompt template, as listed by `prompts/list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<Value>,
}

impl PromptDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            arguments: Vec::new(),
        }
    }
}

// == Tool Host ==
/// Anything that can list and execute tools: the in-process registry or the
/// prefix-routing proxy.
///
/// `call_tool` returns the tool's envelope as JSON. `Err` is reserved for
/// failures to reach the tool at all (unknown name, unreachable backend).
#[async_trait]
pub trait ToolHost: Send + Sync {
    /// Short label reported by the health endpoint.
    fn mode(&self) -> &'static str;

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>>;

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value>;

    async fn list_prompts(&self) -> Result<Vec<PromptDescriptor>>;

    /// Renders a prompt as an MCP `prompts/get` result.
    async fn get_prompt(&self, name: &str) -> Result<Value>;

    /// Runs `call_tool` under a caller-supplied deadline.
    ///
    /// Dropping the in-flight future is the only side effect of a timeout;
    /// cache inserts are single lock-held operations, so no partial entry
    /// can be left behind.
    async fn call_tool_with_timeout(
        &self,
        name: &str,
        arguments: Value,
        timeout: Duration,
    ) -> Result<Value> {
        match tokio::time::timeout(timeout, self.call_tool(name, arguments)).await {
            Ok(result) => result,
            Err(_) => Err(ToolError::Timeout(format!(
                "{} did not answer within {}ms",
                name,
                timeout.as_millis()
            ))),
        }
    }
}

// == Tool Context ==
/// Defaults applied when a call leaves an option unset.
#[derive(Debug, Clone)]
pub struct ToolDefaults {
    pub max_file_size: u64,
    pub skip_patterns: Vec<String>,
}

impl Default for ToolDefaults {
    fn default() -> Self {
        Self {
            max_file_size: prepare::DEFAULT_MAX_FILE_SIZE,
            skip_patterns: Vec::new(),
        }
    }
}

/// Shared state handed to every tool handler.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub cache: SharedCache,
    pub defaults: ToolDefaults,
    pub credentials: CredentialReader,
}

impl ToolContext {
    pub fn new(cache: SharedCache, defaults: ToolDefaults) -> Self {
        Self {
            cache,
            defaults,
            credentials: CredentialReader::from_home(),
        }
    }

    /// Replaces the home directory used for credential fallbacks.
    pub fn with_home_dir(mut self, home: impl Into<PathBuf>) -> Self {
        self.credentials = CredentialReader::new(Some(home.into()));
        self
    }

    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

// == Utility Functions ==
/// Seconds since the Unix epoch, with sub-second precision.
pub(crate) fn epoch_secs(time: SystemTime) -> Option<f64> {
    time.duration_since(UNIX_EPOCH)
        .ok()
        .map(|d| d.as_secs_f64())
}

/// Runs blocking filesystem work off the async executor.
pub(crate) async fn run_blocking<T, F>(work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ToolError::Internal(format!("blocking task failed: {}", e)))?
}
