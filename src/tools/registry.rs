//! Tool Registry
//!
//! Explicit table of tool name -> (descriptor, handler). Every built-in tool
//! is registered up front; lookups never load anything lazily.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::error::{Result, ToolError};
use crate::models::{
    CachedDataResponse, ClearCacheRequest, ClearCacheResponse, ConfigTemplateRequest, Envelope,
    ExploreDirectoryRequest, GetCachedDataRequest, PrepareFolderRequest, ReadCredentialsRequest,
    ReadLocalFileRequest, SaveDownloadRequest, ValidateDatasetRequest,
};
use crate::protocol::prompt_result;
use crate::tools::{
    dataset, explore, files, prepare, PromptDescriptor, ToolContext, ToolDescriptor, ToolHost,
};

/// Future returned by a registered handler.
pub type ToolFuture = BoxFuture<'static, Result<Envelope>>;

type Handler = Arc<dyn Fn(Arc<ToolContext>, Value) -> ToolFuture + Send + Sync>;

const LOCAL_FILE_WORKFLOW: &str = "\
Local file workflow:

1. Explore and check
   - explore_directory to browse a folder
   - validate_dataset to inspect CSV or JSON files
   - create_config_template to draft a training config from a dataset

2. Upload
   - prepare_local_folder snapshots a folder and returns a cache_id
   - get_cached_data with that cache_id returns the folder structure and the
     base64 file contents to hand to the remote upload tool

3. Credentials
   - read_credentials loads the credentials file; pass credentials_text on
     to the remote task

4. Results
   - save_download_locally writes each downloaded file (base64) to disk
   - read_local_file reads a single file back

Notes:
- Cached folders expire after the cache TTL (one hour by default)
- Files over the size limit (100MB by default) are skipped
- skip_patterns excludes files by glob, e.g. *.log
- clear_cache removes one entry or sweeps expired ones
";

/// Deserializes tool arguments; a missing (`null`) argument object counts
/// as empty.
pub fn parse_args<T: DeserializeOwned>(arguments: Value) -> Result<T> {
    let arguments = match arguments {
        Value::Null => Value::Object(Map::new()),
        other => other,
    };
    serde_json::from_value(arguments).map_err(|e| ToolError::InvalidRequest(e.to_string()))
}

// == Registry ==
pub struct ToolRegistry {
    ctx: Arc<ToolContext>,
    /// Registration order, used for listing
    descriptors: Vec<ToolDescriptor>,
    handlers: HashMap<String, Handler>,
    /// Prompt templates with their text, in registration order
    prompts: Vec<(PromptDescriptor, String)>,
}

impl ToolRegistry {
    /// Empty registry sharing `ctx` with every handler.
    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self {
            ctx,
            descriptors: Vec::new(),
            handlers: HashMap::new(),
            prompts: Vec::new(),
        }
    }

    /// Registry with all built-in local tools.
    pub fn with_builtin_tools(ctx: Arc<ToolContext>) -> Self {
        let mut registry = Self::new(ctx);
        registry.register_builtins();
        registry.prompts.push((
            PromptDescriptor::new("local_file_workflow", "Complete local file handling workflow"),
            LOCAL_FILE_WORKFLOW.to_string(),
        ));
        info!(
            "Registered {} local tools and {} prompts",
            registry.descriptors.len(),
            registry.prompts.len()
        );
        registry
    }

    pub fn context(&self) -> &Arc<ToolContext> {
        &self.ctx
    }

    /// Adds a tool. Names must be unique.
    pub fn register<F, Fut>(&mut self, descriptor: ToolDescriptor, handler: F) -> Result<()>
    where
        F: Fn(Arc<ToolContext>, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Envelope>> + Send + 'static,
    {
        if self.handlers.contains_key(&descriptor.name) {
            return Err(ToolError::InvalidRequest(format!(
                "tool already registered: {}",
                descriptor.name
            )));
        }
        self.insert(descriptor, handler);
        Ok(())
    }

    fn insert<F, Fut>(&mut self, descriptor: ToolDescriptor, handler: F)
    where
        F: Fn(Arc<ToolContext>, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Envelope>> + Send + 'static,
    {
        debug!("Registered tool: {}", descriptor.name);
        let erased: Handler =
            Arc::new(move |ctx: Arc<ToolContext>, args: Value| -> ToolFuture {
                handler(ctx, args).boxed()
            });
        self.handlers.insert(descriptor.name.clone(), erased);
        self.descriptors.push(descriptor);
    }

    /// Adds a static prompt. Names must be unique.
    pub fn register_prompt(
        &mut self,
        descriptor: PromptDescriptor,
        text: impl Into<String>,
    ) -> Result<()> {
        if self.prompts.iter().any(|(p, _)| p.name == descriptor.name) {
            return Err(ToolError::InvalidRequest(format!(
                "prompt already registered: {}",
                descriptor.name
            )));
        }
        debug!("Registered prompt: {}", descriptor.name);
        self.prompts.push((descriptor, text.into()));
        Ok(())
    }

    pub fn descriptors(&self) -> &[ToolDescriptor] {
        &self.descriptors
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    fn descriptor(&self, name: &str) -> Option<&ToolDescriptor> {
        self.descriptors.iter().find(|d| d.name == name)
    }

    /// Runs a tool and returns its envelope.
    ///
    /// Only an unknown name is an `Err`; argument and tool failures come back
    /// as `success: false` envelopes.
    pub async fn dispatch(&self, name: &str, arguments: Value) -> Result<Envelope> {
        let (Some(handler), Some(descriptor)) = (self.handlers.get(name), self.descriptor(name))
        else {
            return Err(ToolError::UnknownTool(name.to_string()));
        };

        if let Err(err) = descriptor.check_required(&arguments) {
            return Ok(Envelope::failure(err));
        }

        debug!("Calling tool: {}", name);
        let envelope = match handler(Arc::clone(&self.ctx), arguments).await {
            Ok(envelope) => envelope,
            Err(err) => {
                info!("Tool {} failed: {}", name, err);
                Envelope::failure(err)
            }
        };
        Ok(envelope)
    }

    // == Built-in Tools ==
    fn register_builtins(&mut self) {
        self.insert(
            ToolDescriptor::new(
                "prepare_local_folder",
                "Walk a local folder, base64-encode its files and cache the result. \
                 Returns a cache_id for get_cached_data.",
                json!({
                    "type": "object",
                    "properties": {
                        "folder_path": {"type": "string", "description": "Folder to prepare"},
                        "max_file_size": {"type": "integer", "description": "Skip files larger than this many bytes"},
                        "skip_patterns": {"type": "array", "items": {"type": "string"}, "description": "Glob patterns to exclude"}
                    },
                    "required": ["folder_path"]
                }),
            ),
            |ctx, args| async move {
                let req: PrepareFolderRequest = parse_args(args)?;
                Envelope::ok(prepare::prepare_local_folder(&ctx, req).await?)
            },
        );

        self.insert(
            ToolDescriptor::new(
                "get_cached_data",
                "Return the folder structure and file contents stored under a cache_id.",
                json!({
                    "type": "object",
                    "properties": {
                        "cache_id": {"type": "string", "description": "Id returned by prepare_local_folder"}
                    },
                    "required": ["cache_id"]
                }),
            ),
            |ctx, args| async move {
                let req: GetCachedDataRequest = parse_args(args)?;
                let entry = ctx.cache.write().await.get(&req.cache_id)?;
                Envelope::ok(CachedDataResponse {
                    cache_id: &entry.cache_id,
                    source_path: &entry.source_path,
                    created_at: entry.created_at_rfc3339(),
                    folder_structure: &entry.folder_structure,
                    file_contents: &entry.file_contents,
                })
            },
        );

        self.insert(
            ToolDescriptor::new(
                "explore_directory",
                "Describe a directory as a tree, down to max_depth levels.",
                json!({
                    "type": "object",
                    "properties": {
                        "directory_path": {"type": "string"},
                        "max_depth": {"type": "integer", "default": 3},
                        "include_hidden": {"type": "boolean", "default": false}
                    },
                    "required": ["directory_path"]
                }),
            ),
            |_ctx, args| async move {
                let req: ExploreDirectoryRequest = parse_args(args)?;
                Envelope::ok(explore::explore_directory(req).await?)
            },
        );

        self.insert(
            ToolDescriptor::new(
                "read_local_file",
                "Read one file as text, or as base64 when binary or undecodable.",
                json!({
                    "type": "object",
                    "properties": {
                        "file_path": {"type": "string"},
                        "as_text": {"type": "boolean", "default": true},
                        "encoding": {"type": "string", "default": "utf-8"}
                    },
                    "required": ["file_path"]
                }),
            ),
            |_ctx, args| async move {
                let req: ReadLocalFileRequest = parse_args(args)?;
                Envelope::ok(files::read_local_file(req).await?)
            },
        );

        self.insert(
            ToolDescriptor::new(
                "validate_dataset",
                "Summarize a CSV or JSON dataset file.",
                json!({
                    "type": "object",
                    "properties": {"file_path": {"type": "string"}},
                    "required": ["file_path"]
                }),
            ),
            |_ctx, args| async move {
                let req: ValidateDatasetRequest = parse_args(args)?;
                Envelope::ok(dataset::validate_dataset(req).await?)
            },
        );

        self.insert(
            ToolDescriptor::new(
                "read_credentials",
                "Load a credentials file, falling back to well-known locations in the home directory.",
                json!({
                    "type": "object",
                    "properties": {
                        "creds_path": {"type": "string"},
                        "provider": {"type": "string", "description": "bedrock, openai or anthropic"}
                    },
                    "required": ["creds_path"]
                }),
            ),
            |ctx, args| async move {
                let req: ReadCredentialsRequest = parse_args(args)?;
                Envelope::ok(ctx.credentials.read(req).await?)
            },
        );

        self.insert(
            ToolDescriptor::new(
                "save_download_locally",
                "Decode base64 content and write it to a local path.",
                json!({
                    "type": "object",
                    "properties": {
                        "content_b64": {"type": "string"},
                        "target_path": {"type": "string"},
                        "create_dirs": {"type": "boolean", "default": true}
                    },
                    "required": ["content_b64", "target_path"]
                }),
            ),
            |_ctx, args| async move {
                let req: SaveDownloadRequest = parse_args(args)?;
                Envelope::ok(files::save_download_locally(req).await?)
            },
        );

        self.insert(
            ToolDescriptor::new(
                "clear_cache",
                "Delete one cache entry, or sweep all expired entries when no id is given.",
                json!({
                    "type": "object",
                    "properties": {"cache_id": {"type": "string"}}
                }),
            ),
            |ctx, args| async move {
                let req: ClearCacheRequest = parse_args(args)?;
                let mut cache = ctx.cache.write().await;
                let (message, removed) = match req.cache_id {
                    Some(id) => {
                        cache.delete(&id)?;
                        (format!("Cleared cache: {}", id), 1)
                    }
                    None => {
                        let removed = cache.sweep();
                        (format!("Cleared {} expired caches", removed), removed)
                    }
                };
                Envelope::ok(ClearCacheResponse {
                    message,
                    removed,
                    active_caches: cache.len(),
                })
            },
        );

        self.insert(
            ToolDescriptor::new(
                "create_config_template",
                "Build a training config template, inferring the label column from a dataset.",
                json!({
                    "type": "object",
                    "properties": {
                        "dataset_path": {"type": "string"},
                        "task_type": {"type": "string", "default": "auto"}
                    }
                }),
            ),
            |_ctx, args| async move {
                let req: ConfigTemplateRequest = parse_args(args)?;
                Envelope::ok(dataset::create_config_template(req).await?)
            },
        );
    }
}

// == ToolHost Implementation ==
#[async_trait]
impl ToolHost for ToolRegistry {
    fn mode(&self) -> &'static str {
        "local"
    }

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        Ok(self.descriptors.clone())
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value> {
        self.dispatch(name, arguments).await.map(Envelope::into_value)
    }

    async fn list_prompts(&self) -> Result<Vec<PromptDescriptor>> {
        Ok(self.prompts.iter().map(|(p, _)| p.clone()).collect())
    }

    async fn get_prompt(&self, name: &str) -> Result<Value> {
        self.prompts
            .iter()
            .find(|(p, _)| p.name == name)
            .map(|(p, text)| prompt_result(&p.description, text))
            .ok_or_else(|| ToolError::UnknownPrompt(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{self, CacheStore};
    use crate::tools::ToolDefaults;
    use std::time::Duration;
    use tempfile::TempDir;

    fn registry() -> ToolRegistry {
        let ctx = ToolContext::new(cache::shared(CacheStore::new(3600)), ToolDefaults::default());
        ToolRegistry::with_builtin_tools(ctx.into_shared())
    }

    #[test]
    fn test_builtin_tools_listed_in_order() {
        let registry = registry();
        let names: Vec<&str> = registry.descriptors().iter().map(|d| d.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "prepare_local_folder",
                "get_cached_data",
                "explore_directory",
                "read_local_file",
                "validate_dataset",
                "read_credentials",
                "save_download_locally",
                "clear_cache",
                "create_config_template",
            ]
        );
    }

    #[test]
    fn test_parse_args_treats_null_as_empty() {
        let req: ClearCacheRequest = parse_args(Value::Null).unwrap();
        assert!(req.cache_id.is_none());
    }

    #[tokio::test]
    async fn test_unknown_tool_is_err() {
        let result = registry().dispatch("nope", json!({})).await;
        assert!(matches!(result, Err(ToolError::UnknownTool(_))));
    }

    #[tokio::test]
    async fn test_missing_required_argument_is_failure_envelope() {
        let envelope = registry().dispatch("read_local_file", json!({})).await.unwrap();
        assert!(!envelope.success);
        assert!(envelope.error.unwrap().contains("file_path"));
    }

    #[tokio::test]
    async fn test_wrong_argument_type_is_failure_envelope() {
        let envelope = registry()
            .dispatch("explore_directory", json!({"directory_path": 5}))
            .await
            .unwrap();
        assert!(!envelope.success);
    }

    #[tokio::test]
    async fn test_prepare_then_get_cached_data() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "hi").unwrap();
        let registry = registry();

        let prepared = registry
            .call_tool(
                "prepare_local_folder",
                json!({"folder_path": dir.path().display().to_string()}),
            )
            .await
            .unwrap();
        assert_eq!(prepared["success"], true);
        assert_eq!(prepared["summary"]["total_files"], 1);
        let cache_id = prepared["cache_id"].as_str().unwrap();

        let cached = registry
            .call_tool("get_cached_data", json!({"cache_id": cache_id}))
            .await
            .unwrap();
        assert_eq!(cached["success"], true);
        assert_eq!(cached["file_contents"]["a.txt"], "aGk=");
        assert_eq!(cached["folder_structure"][0]["relative_path"], "a.txt");
    }

    #[tokio::test]
    async fn test_clear_cache_by_id_and_sweep() {
        let dir = TempDir::new().unwrap();
        let registry = registry();
        let prepared = registry
            .call_tool(
                "prepare_local_folder",
                json!({"folder_path": dir.path().display().to_string()}),
            )
            .await
            .unwrap();
        let cache_id = prepared["cache_id"].as_str().unwrap().to_string();

        let swept = registry.call_tool("clear_cache", json!({})).await.unwrap();
        assert_eq!(swept["message"], "Cleared 0 expired caches");
        assert_eq!(swept["active_caches"], 1);

        let cleared = registry
            .call_tool("clear_cache", json!({"cache_id": cache_id}))
            .await
            .unwrap();
        assert_eq!(cleared["message"], format!("Cleared cache: {}", cache_id));
        assert_eq!(cleared["active_caches"], 0);

        let again = registry
            .call_tool("clear_cache", json!({"cache_id": cache_id}))
            .await
            .unwrap();
        assert_eq!(again["success"], false);
    }

    #[tokio::test]
    async fn test_register_custom_tool_and_reject_duplicate() {
        let mut registry = registry();
        let descriptor = ToolDescriptor::new("echo", "Echo arguments", json!({"type": "object"}));
        registry
            .register(descriptor.clone(), |_ctx, args| async move {
                Envelope::ok(json!({ "echo": args }))
            })
            .unwrap();

        assert!(registry.contains("echo"));
        let out = registry.call_tool("echo", json!({"x": 1})).await.unwrap();
        assert_eq!(out["echo"]["x"], 1);

        let dup = registry.register(descriptor, |_ctx, _args| async move { Envelope::ok(json!({})) });
        assert!(matches!(dup, Err(ToolError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_builtin_prompt_listed_and_rendered() {
        let registry = registry();
        let prompts = registry.list_prompts().await.unwrap();
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0].name, "local_file_workflow");

        let rendered = registry.get_prompt("local_file_workflow").await.unwrap();
        let text = rendered["messages"][0]["content"]["text"].as_str().unwrap();
        assert!(text.contains("prepare_local_folder"));
        assert!(text.contains("get_cached_data"));
        assert!(text.contains("save_download_locally"));
    }

    #[tokio::test]
    async fn test_unknown_prompt_and_duplicate_prompt() {
        let mut registry = registry();
        let result = registry.get_prompt("nope").await;
        assert!(matches!(result, Err(ToolError::UnknownPrompt(_))));

        registry
            .register_prompt(PromptDescriptor::new("triage", "Check status"), "1. check")
            .unwrap();
        let dup = registry.register_prompt(PromptDescriptor::new("triage", "again"), "x");
        assert!(matches!(dup, Err(ToolError::InvalidRequest(_))));

        let rendered = registry.get_prompt("triage").await.unwrap();
        assert_eq!(rendered["messages"][0]["content"]["text"], "1. check");
    }

    #[tokio::test]
    async fn test_call_with_timeout_elapses() {
        let mut registry = registry();
        registry
            .register(
                ToolDescriptor::new("slow", "Sleeps", json!({"type": "object"})),
                |_ctx, _args| async move {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Envelope::ok(json!({}))
                },
            )
            .unwrap();

        let result = registry
            .call_tool_with_timeout("slow", json!({}), Duration::from_millis(20))
            .await;
        assert!(matches!(result, Err(ToolError::Timeout(_))));
    }
}
