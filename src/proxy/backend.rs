//! Backend descriptors and connections.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, ToolError};
use crate::proxy::{HttpBackend, RpcTransport, StdioBackend};
use crate::tools::{PromptDescriptor, ToolDescriptor, ToolHost, ToolRegistry};

// == Configuration ==
/// One entry of the backend table, as read from `MCP_BACKENDS`.
///
/// ```json
/// {"prefix": "remote", "transport": "http", "url": "http://10.0.0.5:8000/mcp"}
/// ```
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    pub prefix: String,
    #[serde(flatten)]
    pub transport: TransportConfig,
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "transport", rename_all = "kebab-case")]
pub enum TransportConfig {
    /// The local tool registry of this process
    InProcess,
    Http {
        url: String,
        #[serde(default)]
        headers: HashMap<String, String>,
    },
    Stdio {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        env: HashMap<String, String>,
    },
}

impl BackendConfig {
    pub fn in_process(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            transport: TransportConfig::InProcess,
        }
    }

    pub fn http(prefix: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            transport: TransportConfig::Http {
                url: url.into(),
                headers: HashMap::new(),
            },
        }
    }
}

// Header values and child environments may hold secrets; only names are shown.
impl fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:?}", self.prefix, self.transport)
    }
}

impl fmt::Debug for TransportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportConfig::InProcess => write!(f, "in-process"),
            TransportConfig::Http { url, headers } => {
                let names: Vec<&String> = headers.keys().collect();
                write!(f, "http {} (headers: {:?})", url, names)
            }
            TransportConfig::Stdio { command, args, env } => {
                let names: Vec<&String> = env.keys().collect();
                write!(f, "stdio {} {:?} (env: {:?})", command, args, names)
            }
        }
    }
}

// == Connection ==
/// A live backend, matched by prefix in the router.
pub enum Backend {
    Local(Arc<ToolRegistry>),
    Http(HttpBackend),
    Stdio(StdioBackend),
}

impl Backend {
    /// Opens the connection described by `config`.
    ///
    /// `local` serves in-process entries. HTTP backends connect lazily on
    /// first use; stdio backends spawn their process immediately.
    pub fn connect(
        config: &BackendConfig,
        local: Option<&Arc<ToolRegistry>>,
        timeout: Duration,
    ) -> Result<Self> {
        match &config.transport {
            TransportConfig::InProcess => local.cloned().map(Backend::Local).ok_or_else(|| {
                ToolError::InvalidRequest(format!(
                    "backend {} is in-process but no local registry is available",
                    config.prefix
                ))
            }),
            TransportConfig::Http { url, headers } => {
                HttpBackend::new(url.clone(), headers, timeout).map(Backend::Http)
            }
            TransportConfig::Stdio { command, args, env } => {
                StdioBackend::spawn(command, args, env, timeout).map(Backend::Stdio)
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Backend::Local(_) => "in-process",
            Backend::Http(_) => "http",
            Backend::Stdio(_) => "stdio",
        }
    }

    pub async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        match self {
            Backend::Local(registry) => registry.list_tools().await,
            Backend::Http(remote) => remote.list_tools().await,
            Backend::Stdio(remote) => remote.list_tools().await,
        }
    }

    /// Runs a tool by its unprefixed name and returns the envelope.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value> {
        match self {
            Backend::Local(registry) => registry.call_tool(name, arguments).await,
            Backend::Http(remote) => RpcTransport::call_tool(remote, name, arguments).await,
            Backend::Stdio(remote) => RpcTransport::call_tool(remote, name, arguments).await,
        }
    }

    pub async fn list_prompts(&self) -> Result<Vec<PromptDescriptor>> {
        match self {
            Backend::Local(registry) => registry.list_prompts().await,
            Backend::Http(remote) => remote.list_prompts().await,
            Backend::Stdio(remote) => remote.list_prompts().await,
        }
    }

    /// Renders a prompt by its unprefixed name.
    pub async fn get_prompt(&self, name: &str) -> Result<Value> {
        match self {
            Backend::Local(registry) => registry.get_prompt(name).await,
            Backend::Http(remote) => RpcTransport::get_prompt(remote, name).await,
            Backend::Stdio(remote) => RpcTransport::get_prompt(remote, name).await,
        }
    }
}
