//! Proxy Module
//!
//! Prefix routing over several tool backends. One backend may be the
//! in-process registry; the others are reached over HTTP or a child
//! process's stdio, both speaking MCP JSON-RPC.

pub mod backend;
pub mod http;
pub mod router;
pub mod stdio;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{Result, ToolError};
use crate::protocol::{normalize_tool_result, IMPLEMENTATION_NAME, PROTOCOL_VERSION};
use crate::tools::{PromptDescriptor, ToolDescriptor};

pub use backend::{Backend, BackendConfig, TransportConfig};
pub use http::HttpBackend;
pub use router::ProxyRouter;
pub use stdio::StdioBackend;

// == Remote Transport ==
/// A JSON-RPC connection to a remote MCP server.
///
/// Implementors provide raw request/notify plus one-time initialization;
/// tool listing and invocation are shared.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    /// Sends a request and returns its `result`.
    async fn send(&self, method: &str, params: Option<Value>) -> Result<Value>;

    /// Sends a notification; no answer is expected.
    async fn notify(&self, method: &str, params: Option<Value>) -> Result<()>;

    /// Runs the `initialize` handshake once per connection.
    async fn ensure_initialized(&self) -> Result<()>;

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        self.ensure_initialized().await?;
        let result = self.send("tools/list", None).await?;
        let tools = result.get("tools").cloned().unwrap_or_else(|| json!([]));
        serde_json::from_value(tools)
            .map_err(|e| ToolError::BackendRejected(format!("malformed tools/list result: {}", e)))
    }

    /// Forwards a call and reduces the answer to the tool envelope.
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value> {
        self.ensure_initialized().await?;
        let result = self
            .send(
                "tools/call",
                Some(json!({ "name": name, "arguments": arguments })),
            )
            .await?;
        Ok(normalize_tool_result(result))
    }

    async fn list_prompts(&self) -> Result<Vec<PromptDescriptor>> {
        self.ensure_initialized().await?;
        let result = self.send("prompts/list", None).await?;
        let prompts = result.get("prompts").cloned().unwrap_or_else(|| json!([]));
        serde_json::from_value(prompts).map_err(|e| {
            ToolError::BackendRejected(format!("malformed prompts/list result: {}", e))
        })
    }

    /// The backend's `prompts/get` result, passed through as is.
    async fn get_prompt(&self, name: &str) -> Result<Value> {
        self.ensure_initialized().await?;
        self.send("prompts/get", Some(json!({ "name": name }))).await
    }
}

/// The client side of the MCP `initialize` exchange.
pub(crate) async fn handshake<T: RpcTransport + ?Sized>(transport: &T) -> Result<()> {
    let result = transport
        .send(
            "initialize",
            Some(json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {},
                "clientInfo": {
                    "name": IMPLEMENTATION_NAME,
                    "version": env!("CARGO_PKG_VERSION")
                }
            })),
        )
        .await?;
    let server_name = result
        .get("serverInfo")
        .and_then(|info| info.get("name"))
        .and_then(Value::as_str)
        .unwrap_or("unknown");
    debug!("Initialized backend: {}", server_name);
    transport.notify("notifications/initialized", None).await
}
