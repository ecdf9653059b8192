//! Directory Exploration
//!
//! Produces a depth-bounded tree view of a directory without reading file
//! contents.

use std::fs::{self, Metadata};
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{Result, ToolError};
use crate::models::{ExploreDirectoryRequest, ExploreResponse};
use crate::tools::{epoch_secs, run_blocking};

fn is_false(value: &bool) -> bool {
    !*value
}

// == Directory Node ==
/// One node of the explored tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DirectoryNode {
    File {
        name: String,
        size: u64,
        modified: Option<f64>,
        /// Extension including the dot, empty when absent
        extension: String,
    },
    Directory {
        name: String,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        children: Vec<DirectoryNode>,
        count: usize,
        /// Set when the depth limit stopped expansion here
        #[serde(skip_serializing_if = "is_false")]
        truncated: bool,
        /// Set when the children could not be listed
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl DirectoryNode {
    pub fn name(&self) -> &str {
        match self {
            DirectoryNode::File { name, .. } | DirectoryNode::Directory { name, .. } => name,
        }
    }

    pub fn children(&self) -> &[DirectoryNode] {
        match self {
            DirectoryNode::File { .. } => &[],
            DirectoryNode::Directory { children, .. } => children,
        }
    }

    pub fn is_truncated(&self) -> bool {
        matches!(self, DirectoryNode::Directory { truncated: true, .. })
    }

    pub fn child(&self, name: &str) -> Option<&DirectoryNode> {
        self.children().iter().find(|c| c.name() == name)
    }

    fn file(name: String, path: &Path, meta: Option<&Metadata>) -> Self {
        DirectoryNode::File {
            extension: path
                .extension()
                .map(|ext| format!(".{}", ext.to_string_lossy()))
                .unwrap_or_default(),
            size: meta.map_or(0, Metadata::len),
            modified: meta.and_then(|m| m.modified().ok()).and_then(epoch_secs),
            name,
        }
    }

    fn directory(name: String, children: Vec<DirectoryNode>) -> Self {
        DirectoryNode::Directory {
            name,
            count: children.len(),
            children,
            truncated: false,
            error: None,
        }
    }

    fn truncated(name: String) -> Self {
        DirectoryNode::Directory {
            name,
            children: Vec::new(),
            count: 0,
            truncated: true,
            error: None,
        }
    }

    fn unlistable(name: String, err: &io::Error) -> Self {
        let message = match err.kind() {
            io::ErrorKind::PermissionDenied => "Permission denied".to_string(),
            _ => err.to_string(),
        };
        DirectoryNode::Directory {
            name,
            children: Vec::new(),
            count: 0,
            truncated: false,
            error: Some(message),
        }
    }
}

// == Explorer ==
#[derive(Debug, Clone, Copy)]
pub struct ExploreOptions {
    pub max_depth: usize,
    pub include_hidden: bool,
}

fn node_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Builds the tree rooted at `root`. Blocking.
///
/// Only a missing root fails; listing errors further down become error
/// markers on the affected directory.
pub fn explore(root: &Path, options: ExploreOptions) -> Result<DirectoryNode> {
    explore_with(root, options, &list_children)
}

/// [`explore`] with the directory lister supplied by the caller.
fn explore_with<L>(root: &Path, options: ExploreOptions, list: &L) -> Result<DirectoryNode>
where
    L: Fn(&Path) -> io::Result<Vec<(String, PathBuf)>>,
{
    if let Err(err) = fs::symlink_metadata(root) {
        return Err(ToolError::from_io(err, root.display().to_string()));
    }
    Ok(describe(root, node_name(root), 0, options, list))
}

/// Name and path of every entry directly under `path`. Entries that cannot
/// be read are logged and left out.
fn list_children(path: &Path) -> io::Result<Vec<(String, PathBuf)>> {
    let mut entries = Vec::new();
    for item in fs::read_dir(path)? {
        match item {
            Ok(entry) => {
                let child_name = entry.file_name().to_string_lossy().into_owned();
                entries.push((child_name, entry.path()));
            }
            Err(err) => warn!("Failed to read entry in {}: {}", path.display(), err),
        }
    }
    Ok(entries)
}

/// Files are always described in full. Directories at or beyond the depth
/// limit become truncated markers without children.
fn describe<L>(
    path: &Path,
    name: String,
    depth: usize,
    options: ExploreOptions,
    list: &L,
) -> DirectoryNode
where
    L: Fn(&Path) -> io::Result<Vec<(String, PathBuf)>>,
{
    let meta = fs::metadata(path).or_else(|_| fs::symlink_metadata(path)).ok();

    let is_dir = meta.as_ref().map_or(false, Metadata::is_dir);
    if !is_dir {
        return DirectoryNode::file(name, path, meta.as_ref());
    }

    if depth >= options.max_depth {
        return DirectoryNode::truncated(name);
    }

    let mut entries = match list(path) {
        Ok(entries) => entries,
        Err(err) => {
            debug!("Cannot list {}: {}", path.display(), err);
            return DirectoryNode::unlistable(name, &err);
        }
    };
    if !options.include_hidden {
        entries.retain(|(child_name, _)| !child_name.starts_with('.'));
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let children = entries
        .into_iter()
        .map(|(child_name, child_path)| {
            describe(&child_path, child_name, depth + 1, options, list)
        })
        .collect();

    DirectoryNode::directory(name, children)
}

/// `explore_directory`: depth-bounded tree of a directory.
pub async fn explore_directory(req: ExploreDirectoryRequest) -> Result<ExploreResponse> {
    if let Some(msg) = req.validate() {
        return Err(ToolError::InvalidRequest(msg));
    }

    let options = ExploreOptions {
        max_depth: req.depth(),
        include_hidden: req.include_hidden,
    };
    let base_path = req.directory_path;
    let root = base_path.clone();
    let tree = run_blocking(move || explore(Path::new(&root), options)).await?;

    Ok(ExploreResponse { tree, base_path })
}
