//! MCP Bridge - local file tools and a prefix-routing tool proxy
//!
//! Serves a fixed set of filesystem tools (folder snapshots held in a TTL
//! cache, directory trees, file reads, dataset checks) over JSON-RPC, either
//! directly or behind a router that merges them with remote tool servers.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod protocol;
pub mod proxy;
pub mod tasks;
pub mod tools;

pub use api::AppState;
pub use config::{Config, ServerMode, Transport};
pub use error::{Result, ToolError};
pub use proxy::{BackendConfig, ProxyRouter};
pub use tasks::spawn_cleanup_task;
pub use tools::{ToolHost, ToolRegistry};
