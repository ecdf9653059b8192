//! Request DTOs for the tool surface
//!
//! Each struct mirrors the JSON arguments of one tool. Optional arguments fall
//! back to server defaults when absent or `null`.

use serde::Deserialize;

/// Default expansion depth for `explore_directory`.
pub const DEFAULT_MAX_DEPTH: usize = 3;

fn default_true() -> bool {
    true
}

fn default_encoding() -> String {
    "utf-8".to_string()
}

fn default_task_type() -> String {
    "auto".to_string()
}

/// Returns an error message when a path argument is blank.
fn require_path(field: &str, value: &str) -> Option<String> {
    if value.trim().is_empty() {
        Some(format!("{} cannot be empty", field))
    } else {
        None
    }
}

/// Arguments of `prepare_local_folder`.
#[derive(Debug, Clone, Deserialize)]
pub struct PrepareFolderRequest {
    /// Folder to walk
    pub folder_path: String,
    /// Files larger than this many bytes are skipped
    #[serde(default)]
    pub max_file_size: Option<u64>,
    /// Exclusion globs such as `*.log`
    #[serde(default)]
    pub skip_patterns: Option<Vec<String>>,
}

impl PrepareFolderRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        require_path("folder_path", &self.folder_path)
    }
}

/// Arguments of `get_cached_data`.
#[derive(Debug, Clone, Deserialize)]
pub struct GetCachedDataRequest {
    pub cache_id: String,
}

/// Arguments of `explore_directory`.
#[derive(Debug, Clone, Deserialize)]
pub struct ExploreDirectoryRequest {
    pub directory_path: String,
    #[serde(default)]
    pub max_depth: Option<usize>,
    #[serde(default)]
    pub include_hidden: bool,
}

impl ExploreDirectoryRequest {
    pub fn validate(&self) -> Option<String> {
        require_path("directory_path", &self.directory_path)
    }

    pub fn depth(&self) -> usize {
        self.max_depth.unwrap_or(DEFAULT_MAX_DEPTH)
    }
}

/// Arguments of `read_local_file`.
#[derive(Debug, Clone, Deserialize)]
pub struct ReadLocalFileRequest {
    pub file_path: String,
    /// Return text (true) or base64 (false)
    #[serde(default = "default_true")]
    pub as_text: bool,
    #[serde(default = "default_encoding")]
    pub encoding: String,
}

impl ReadLocalFileRequest {
    pub fn validate(&self) -> Option<String> {
        require_path("file_path", &self.file_path)
    }
}

/// Arguments of `validate_dataset`.
#[derive(Debug, Clone, Deserialize)]
pub struct ValidateDatasetRequest {
    pub file_path: String,
}

/// Arguments of `read_credentials`.
#[derive(Debug, Clone, Deserialize)]
pub struct ReadCredentialsRequest {
    pub creds_path: String,
    /// Provider hint echoed back to the caller (bedrock/openai/anthropic)
    #[serde(default)]
    pub provider: Option<String>,
}

/// Arguments of `save_download_locally`.
#[derive(Debug, Clone, Deserialize)]
pub struct SaveDownloadRequest {
    pub content_b64: String,
    pub target_path: String,
    #[serde(default = "default_true")]
    pub create_dirs: bool,
}

impl SaveDownloadRequest {
    pub fn validate(&self) -> Option<String> {
        require_path("target_path", &self.target_path)
    }
}

/// Arguments of `clear_cache`. Without an id, expired entries are swept.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClearCacheRequest {
    #[serde(default)]
    pub cache_id: Option<String>,
}

/// Arguments of `create_config_template`.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigTemplateRequest {
    #[serde(default)]
    pub dataset_path: Option<String>,
    #[serde(default = "default_task_type")]
    pub task_type: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_request_defaults() {
        let json = r#"{"folder_path": "/data"}"#;
        let req: PrepareFolderRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.folder_path, "/data");
        assert!(req.max_file_size.is_none());
        assert!(req.skip_patterns.is_none());
        assert!(req.validate().is_none());
    }

    #[test]
    fn test_prepare_request_blank_path() {
        let json = r#"{"folder_path": "  "}"#;
        let req: PrepareFolderRequest = serde_json::from_str(json).unwrap();
        assert!(req.validate().is_some());
    }

    #[test]
    fn test_explore_request_null_depth_uses_default() {
        let json = r#"{"directory_path": "/tmp", "max_depth": null}"#;
        let req: ExploreDirectoryRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.depth(), DEFAULT_MAX_DEPTH);
        assert!(!req.include_hidden);
    }

    #[test]
    fn test_read_file_request_defaults() {
        let json = r#"{"file_path": "/tmp/a.txt"}"#;
        let req: ReadLocalFileRequest = serde_json::from_str(json).unwrap();
        assert!(req.as_text);
        assert_eq!(req.encoding, "utf-8");
    }

    #[test]
    fn test_save_request_defaults_to_create_dirs() {
        let json = r#"{"content_b64": "aGk=", "target_path": "/tmp/out/x"}"#;
        let req: SaveDownloadRequest = serde_json::from_str(json).unwrap();
        assert!(req.create_dirs);
    }

    #[test]
    fn test_clear_cache_request_empty_object() {
        let req: ClearCacheRequest = serde_json::from_str("{}").unwrap();
        assert!(req.cache_id.is_none());
    }
}
