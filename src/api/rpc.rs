//! JSON-RPC Dispatch
//!
//! Transport-independent handling of MCP requests against a [`ToolHost`].
//! Used by `POST /mcp` and by the stdio loop.

use std::time::Duration;

use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::ToolError;
use crate::models::Envelope;
use crate::protocol::{
    call_tool_result, CallToolParams, GetPromptParams, JsonRpcError, JsonRpcRequest,
    JsonRpcResponse, IMPLEMENTATION_NAME, PROTOCOL_VERSION,
};
use crate::tools::ToolHost;

/// Parses one raw message. A parse failure comes back as the error response
/// to send.
pub fn parse_message(raw: &str) -> Result<JsonRpcRequest, JsonRpcResponse> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| JsonRpcResponse::failure(Value::Null, JsonRpcError::parse_error(e)))?;
    let id = value.get("id").cloned().unwrap_or(Value::Null);
    serde_json::from_value(value)
        .map_err(|e| JsonRpcResponse::failure(id, JsonRpcError::invalid_request(e)))
}

/// Handles one request. Notifications yield `None`.
pub async fn handle_request(host: &dyn ToolHost, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
    let Some(id) = request.id.clone() else {
        debug!("Notification: {}", request.method);
        return None;
    };

    if request.jsonrpc != "2.0" {
        return Some(JsonRpcResponse::failure(
            id,
            JsonRpcError::invalid_request("jsonrpc must be \"2.0\""),
        ));
    }

    let outcome = match request.method.as_str() {
        "initialize" => Ok(json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "tools": {"listChanged": false},
                "prompts": {"listChanged": false}
            },
            "serverInfo": {
                "name": IMPLEMENTATION_NAME,
                "version": env!("CARGO_PKG_VERSION")
            }
        })),
        "ping" => Ok(json!({})),
        "tools/list" => match host.list_tools().await {
            Ok(tools) => Ok(json!({ "tools": tools })),
            Err(err) => Err(JsonRpcError::internal_error(err)),
        },
        "tools/call" => call_tool(host, request.params).await,
        "prompts/list" => match host.list_prompts().await {
            Ok(prompts) => Ok(json!({ "prompts": prompts })),
            Err(err) => Err(JsonRpcError::internal_error(err)),
        },
        "prompts/get" => get_prompt(host, request.params).await,
        other => Err(JsonRpcError::method_not_found(other)),
    };

    Some(match outcome {
        Ok(result) => JsonRpcResponse::success(id, result),
        Err(error) => JsonRpcResponse::failure(id, error),
    })
}

/// Routing and tool failures are reported inside the result envelope, not as
/// JSON-RPC errors.
async fn call_tool(host: &dyn ToolHost, params: Option<Value>) -> Result<Value, JsonRpcError> {
    let params: CallToolParams = params
        .ok_or_else(|| JsonRpcError::invalid_params("missing params"))
        .and_then(|p| serde_json::from_value(p).map_err(JsonRpcError::invalid_params))?;

    let outcome = match params.timeout_ms {
        Some(ms) => {
            host.call_tool_with_timeout(&params.name, params.arguments, Duration::from_millis(ms))
                .await
        }
        None => host.call_tool(&params.name, params.arguments).await,
    };

    let envelope = outcome.unwrap_or_else(|err| {
        warn!("Call to {} failed: {}", params.name, err);
        Envelope::failure(err).into_value()
    });
    Ok(call_tool_result(envelope))
}

/// Unlike tool calls, prompt failures are JSON-RPC errors.
async fn get_prompt(host: &dyn ToolHost, params: Option<Value>) -> Result<Value, JsonRpcError> {
    let params: GetPromptParams = params
        .ok_or_else(|| JsonRpcError::invalid_params("missing params"))
        .and_then(|p| serde_json::from_value(p).map_err(JsonRpcError::invalid_params))?;

    host.get_prompt(&params.name).await.map_err(|err| match err {
        ToolError::UnknownPrompt(_) => JsonRpcError::invalid_params(err),
        other => {
            warn!("Prompt {} failed: {}", params.name, other);
            JsonRpcError::internal_error(other)
        }
    })
}
