//! Folder Preparation
//!
//! Walks a directory tree, base64-encodes every file that passes the size and
//! pattern filters, and stores the result in the payload cache.

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Component, Path};

use base64::{engine::general_purpose::STANDARD, Engine};
use glob::{MatchOptions, Pattern};
use serde::Serialize;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::cache::{CacheEntry, FolderItem};
use crate::error::{Result, ToolError};
use crate::models::{PrepareFolderRequest, PrepareFolderResponse, PrepareSummary};
use crate::tools::{epoch_secs, run_blocking, ToolContext};

/// Default per-file threshold (100 MB)
pub const DEFAULT_MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Number of skipped files echoed back in the summary
pub const MAX_SKIPPED_DETAILS: usize = 10;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

// == Skipped Files ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    PatternExcluded,
    TooLarge,
    ReadError,
}

/// A file left out of the payload. Informational only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedFile {
    pub path: String,
    pub reason: SkipReason,
    pub detail: String,
}

impl SkippedFile {
    fn new(path: &Path, reason: SkipReason, detail: impl Into<String>) -> Self {
        Self {
            path: path.display().to_string(),
            reason,
            detail: detail.into(),
        }
    }
}

// == Options ==
/// Filters applied while walking a folder.
#[derive(Debug, Clone)]
pub struct PrepareOptions {
    pub max_file_size: u64,
    patterns: Vec<Pattern>,
}

impl PrepareOptions {
    /// Compiles the exclusion globs; an invalid glob rejects the whole call.
    pub fn new(max_file_size: u64, skip_patterns: &[String]) -> Result<Self> {
        let patterns = skip_patterns
            .iter()
            .map(|raw| {
                Pattern::new(raw).map_err(|e| {
                    ToolError::InvalidRequest(format!("invalid skip pattern '{}': {}", raw, e))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            max_file_size,
            patterns,
        })
    }

    /// Returns the first pattern matching `relative_path`, if any.
    ///
    /// Patterns are anchored at the end of the path: a pattern with `n`
    /// components is tested against the last `n` components, so `*.log`
    /// matches by file name and `logs/*.txt` matches in any directory.
    pub fn excluded_by(&self, relative_path: &str) -> Option<&Pattern> {
        let options = MatchOptions {
            case_sensitive: true,
            require_literal_separator: true,
            require_literal_leading_dot: false,
        };
        let components: Vec<&str> = relative_path.split('/').collect();

        self.patterns.iter().find(|pattern| {
            let depth = pattern.as_str().trim_matches('/').split('/').count();
            if depth > components.len() {
                return pattern.matches_with(relative_path, options);
            }
            let tail = components[components.len() - depth..].join("/");
            pattern.matches_with(&tail, options)
        })
    }
}

// == Prepared Folder ==
/// Result of walking a folder, before it is cached.
#[derive(Debug, Clone)]
pub struct PreparedFolder {
    pub source_path: String,
    pub folder_structure: Vec<FolderItem>,
    pub file_contents: BTreeMap<String, String>,
    /// Bytes read into `file_contents`
    pub total_size: u64,
    pub skipped: Vec<SkippedFile>,
}

impl PreparedFolder {
    pub fn summary(&self) -> PrepareSummary {
        PrepareSummary {
            total_files: self.file_contents.len(),
            total_size: self.total_size,
            total_size_mb: (self.total_size as f64 / BYTES_PER_MB * 100.0).round() / 100.0,
            skipped_files: self.skipped.len(),
            skipped_details: self
                .skipped
                .iter()
                .take(MAX_SKIPPED_DETAILS)
                .cloned()
                .collect(),
            source_path: self.source_path.clone(),
        }
    }

    pub fn into_entry(self, cache_id: impl Into<String>) -> CacheEntry {
        CacheEntry::new(
            cache_id,
            self.source_path,
            self.folder_structure,
            self.file_contents,
        )
    }
}

/// Joins path components with `/` regardless of platform.
fn relative_key(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

// == Prepare Folder ==
/// Walks `root` and encodes every eligible file. Blocking.
///
/// Per-file problems are recorded in `skipped`; only a missing root or a
/// root that is not a directory fails the call.
pub fn prepare_folder(root: &Path, options: &PrepareOptions) -> Result<PreparedFolder> {
    let root_display = root.display().to_string();
    let metadata = fs::metadata(root).map_err(|e| ToolError::from_io(e, &root_display))?;
    if !metadata.is_dir() {
        return Err(ToolError::NotADirectory(root_display));
    }

    let source_path = fs::canonicalize(root)
        .map(|p| p.display().to_string())
        .unwrap_or(root_display);

    let mut prepared = PreparedFolder {
        source_path,
        folder_structure: Vec::new(),
        file_contents: BTreeMap::new(),
        total_size: 0,
        skipped: Vec::new(),
    };

    let walker = WalkDir::new(root)
        .min_depth(1)
        .follow_links(true)
        .sort_by_file_name();

    for item in walker {
        let entry = match item {
            Ok(entry) => entry,
            Err(err) => {
                let path = err.path().unwrap_or(root).to_path_buf();
                warn!("Failed to walk {}: {}", path.display(), err);
                prepared.skipped.push(SkippedFile::new(
                    &path,
                    SkipReason::ReadError,
                    format!("error: {}", err),
                ));
                continue;
            }
        };

        let path = entry.path();
        let key = relative_key(path.strip_prefix(root).unwrap_or(path));
        let meta = entry.metadata().ok();
        let size = meta.as_ref().map_or(0, |m| m.len());
        let modified_time = meta
            .as_ref()
            .and_then(|m| m.modified().ok())
            .and_then(epoch_secs);

        if entry.file_type().is_dir() {
            prepared.folder_structure.push(FolderItem {
                relative_path: key,
                is_directory: true,
                size: 0,
                modified_time,
            });
            continue;
        }
        if !entry.file_type().is_file() {
            continue;
        }

        prepared.folder_structure.push(FolderItem {
            relative_path: key.clone(),
            is_directory: false,
            size,
            modified_time,
        });

        if let Some(pattern) = options.excluded_by(&key) {
            debug!("Skipping {} (pattern {})", key, pattern);
            prepared.skipped.push(SkippedFile::new(
                path,
                SkipReason::PatternExcluded,
                format!("matched pattern '{}'", pattern),
            ));
            continue;
        }

        if size > options.max_file_size {
            prepared.skipped.push(SkippedFile::new(
                path,
                SkipReason::TooLarge,
                format!("too large: {:.1}MB", size as f64 / BYTES_PER_MB),
            ));
            continue;
        }

        match fs::read(path) {
            Ok(bytes) => {
                prepared.total_size += bytes.len() as u64;
                prepared.file_contents.insert(key, STANDARD.encode(&bytes));
            }
            Err(err) => {
                warn!("Failed to read {}: {}", path.display(), err);
                prepared.skipped.push(SkippedFile::new(
                    path,
                    SkipReason::ReadError,
                    format!("error: {}", err),
                ));
            }
        }
    }

    Ok(prepared)
}

// == Cache Id ==
/// Builds an id from the preparation time, the source path and a random
/// suffix, so two preparations of one folder in the same second differ.
pub fn new_cache_id(source_path: &str) -> String {
    let mut hasher = DefaultHasher::new();
    source_path.hash(&mut hasher);
    let random = uuid::Uuid::new_v4().simple().to_string();

    format!(
        "folder_{}_{:08x}_{}",
        chrono::Local::now().format("%Y%m%d_%H%M%S"),
        hasher.finish() as u32,
        &random[..12]
    )
}

// == Tool Operations ==

/// `prepare_local_folder`: walk, encode and cache a folder.
pub async fn prepare_local_folder(
    ctx: &ToolContext,
    req: PrepareFolderRequest,
) -> Result<PrepareFolderResponse> {
    if let Some(msg) = req.validate() {
        return Err(ToolError::InvalidRequest(msg));
    }

    let skip_patterns = req
        .skip_patterns
        .unwrap_or_else(|| ctx.defaults.skip_patterns.clone());
    let options = PrepareOptions::new(
        req.max_file_size.unwrap_or(ctx.defaults.max_file_size),
        &skip_patterns,
    )?;

    info!("Preparing folder: {}", req.folder_path);
    let root = req.folder_path.clone();
    let prepared = run_blocking(move || prepare_folder(Path::new(&root), &options)).await?;

    let summary = prepared.summary();
    let cache_id = new_cache_id(&prepared.source_path);
    let entry = prepared.into_entry(cache_id.clone());

    ctx.cache.write().await.put(entry);
    info!(
        "Cached {} as {} ({} files, {} skipped)",
        summary.source_path, cache_id, summary.total_files, summary.skipped_files
    );

    Ok(PrepareFolderResponse { cache_id, summary })
}
