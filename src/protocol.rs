//! JSON-RPC 2.0 wire types
//!
//! Shared by the server surface (HTTP `/mcp` and stdio) and by the remote
//! backends the proxy forwards to. Only the MCP subset needed for tool
//! discovery and invocation is modelled.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::ToolError;

/// MCP protocol revision spoken on both sides
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Name reported in `serverInfo` / `clientInfo`
pub const IMPLEMENTATION_NAME: &str = "mcp_bridge";

// == Messages ==
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    /// Absent for notifications
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: Some(json!(id)),
            method: method.into(),
            params,
        }
    }

    pub fn notification(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: None,
            method: method.into(),
            params,
        }
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Value, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }

    /// The numeric id, when the peer used one.
    pub fn numeric_id(&self) -> Option<u64> {
        self.id.as_u64()
    }

    /// Unwraps the result, turning a JSON-RPC error into `BackendRejected`.
    pub fn into_result(self) -> Result<Value, ToolError> {
        match self.error {
            Some(err) => Err(ToolError::BackendRejected(format!(
                "{} (code {})",
                err.message, err.code
            ))),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn parse_error(detail: impl std::fmt::Display) -> Self {
        Self::new(-32700, format!("Parse error: {}", detail))
    }

    pub fn invalid_request(detail: impl std::fmt::Display) -> Self {
        Self::new(-32600, format!("Invalid Request: {}", detail))
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(-32601, format!("Method not found: {}", method))
    }

    pub fn invalid_params(detail: impl std::fmt::Display) -> Self {
        Self::new(-32602, format!("Invalid params: {}", detail))
    }

    pub fn internal_error(detail: impl std::fmt::Display) -> Self {
        Self::new(-32603, detail.to_string())
    }
}

// == Tool Calls ==
/// Parameters of `tools/call`.
#[derive(Debug, Clone, Deserialize)]
pub struct CallToolParams {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
    /// Per-call deadline for the whole invocation
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

// == Prompts ==
/// Parameters of `prompts/get`.
#[derive(Debug, Clone, Deserialize)]
pub struct GetPromptParams {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

/// A static prompt text as an MCP `prompts/get` result: one user message.
pub fn prompt_result(description: &str, text: &str) -> Value {
    json!({
        "description": description,
        "messages": [{
            "role": "user",
            "content": {"type": "text", "text": text}
        }]
    })
}

/// Wraps a tool envelope as an MCP `tools/call` result.
pub fn call_tool_result(envelope: Value) -> Value {
    let is_error = !envelope
        .get("success")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    json!({
        "content": [{"type": "text", "text": envelope.to_string()}],
        "structuredContent": envelope,
        "isError": is_error,
    })
}

fn has_success_flag(value: &Value) -> bool {
    value.get("success").map_or(false, Value::is_boolean)
}

/// Text items of an MCP `content` array, in order.
fn text_items(result: &Value) -> Vec<&str> {
    result
        .get("content")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter(|item| item.get("type").and_then(Value::as_str) == Some("text"))
                .filter_map(|item| item.get("text").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default()
}

/// Reduces a forwarded `tools/call` result to the tool envelope.
///
/// Preference order: `structuredContent` carrying `success`, a text item
/// that parses to an envelope, the raw result when it is an envelope.
/// Anything else is wrapped with `success = !isError`.
pub fn normalize_tool_result(result: Value) -> Value {
    if let Some(structured) = result.get("structuredContent") {
        if has_success_flag(structured) {
            return structured.clone();
        }
    }

    let texts = text_items(&result);
    for text in &texts {
        if let Ok(parsed) = serde_json::from_str::<Value>(text) {
            if has_success_flag(&parsed) {
                return parsed;
            }
        }
    }

    if has_success_flag(&result) {
        return result;
    }

    let is_error = result
        .get("isError")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let mut fields = match result.get("structuredContent") {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    };
    if fields.is_empty() && !texts.is_empty() {
        fields.insert("content".to_string(), Value::String(texts.join("\n")));
    }
    fields.insert("success".to_string(), Value::Bool(!is_error));
    if is_error && !fields.contains_key("error") {
        let message = if texts.is_empty() {
            "remote tool reported an error".to_string()
        } else {
            texts.join("\n")
        };
        fields.insert("error".to_string(), Value::String(message));
    }
    Value::Object(fields)
}

// == Server-Sent Events ==
/// Extracts the JSON-RPC response from a `text/event-stream` body.
///
/// Each event's `data:` lines are joined; the first event that parses as a
/// response with the wanted id (or any id when `want_id` is `None`) wins.
pub fn response_from_sse(body: &str, want_id: Option<u64>) -> Option<JsonRpcResponse> {
    let mut data = String::new();
    let mut events = Vec::new();
    for line in body.lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            if !data.is_empty() {
                events.push(std::mem::take(&mut data));
            }
        } else if let Some(rest) = line.strip_prefix("data:") {
            if !data.is_empty() {
                data.push('\n');
            }
            data.push_str(rest.strip_prefix(' ').unwrap_or(rest));
        }
    }
    if !data.is_empty() {
        events.push(data);
    }

    events
        .iter()
        .filter_map(|event| serde_json::from_str::<JsonRpcResponse>(event).ok())
        .find(|resp| want_id.map_or(true, |id| resp.numeric_id() == Some(id)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_result_is_single_user_message() {
        let result = prompt_result("Workflow", "1. explore\n2. prepare");
        assert_eq!(result["description"], "Workflow");
        let messages = result["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[0]["content"]["type"], "text");
        assert_eq!(messages[0]["content"]["text"], "1. explore\n2. prepare");
    }

    #[test]
    fn test_get_prompt_params_default_arguments() {
        let params: GetPromptParams =
            serde_json::from_value(json!({"name": "local_file_workflow"})).unwrap();
        assert_eq!(params.name, "local_file_workflow");
        assert!(params.arguments.is_null());
    }

    #[test]
    fn test_notification_has_no_id() {
        let value = serde_json::to_value(JsonRpcRequest::notification(
            "notifications/initialized",
            None,
        ))
        .unwrap();
        assert!(value.get("id").is_none());
        assert!(value.get("params").is_none());
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(JsonRpcError::parse_error("x").code, -32700);
        assert_eq!(JsonRpcError::invalid_request("x").code, -32600);
        assert_eq!(JsonRpcError::method_not_found("x").code, -32601);
        assert_eq!(JsonRpcError::invalid_params("x").code, -32602);
        assert_eq!(JsonRpcError::internal_error("x").code, -32603);
    }

    #[test]
    fn test_into_result_maps_rpc_error() {
        let resp = JsonRpcResponse::failure(json!(1), JsonRpcError::method_not_found("foo"));
        assert!(matches!(
            resp.into_result(),
            Err(ToolError::BackendRejected(_))
        ));
    }

    #[test]
    fn test_call_tool_result_carries_envelope_twice() {
        let result = call_tool_result(json!({"success": false, "error": "boom"}));
        assert_eq!(result["isError"], true);
        assert_eq!(result["structuredContent"]["error"], "boom");
        let text = result["content"][0]["text"].as_str().unwrap();
        assert_eq!(serde_json::from_str::<Value>(text).unwrap()["error"], "boom");
    }

    #[test]
    fn test_normalize_prefers_structured_content() {
        let envelope = json!({"success": true, "status": "running"});
        assert_eq!(normalize_tool_result(call_tool_result(envelope.clone())), envelope);
    }

    #[test]
    fn test_normalize_parses_text_envelope() {
        let result = json!({
            "content": [{"type": "text", "text": "{\"success\": true, \"n\": 3}"}],
            "isError": false
        });
        assert_eq!(normalize_tool_result(result), json!({"success": true, "n": 3}));
    }

    #[test]
    fn test_normalize_wraps_plain_text_error() {
        let result = json!({
            "content": [{"type": "text", "text": "tool exploded"}],
            "isError": true
        });
        let envelope = normalize_tool_result(result);
        assert_eq!(envelope["success"], false);
        assert_eq!(envelope["error"], "tool exploded");
    }

    #[test]
    fn test_normalize_passes_raw_envelope_through() {
        let raw = json!({"success": true, "value": 1});
        assert_eq!(normalize_tool_result(raw.clone()), raw);
    }

    #[test]
    fn test_response_from_sse() {
        let body = "event: message\r\n\
                    data: {\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{}}\r\n\r\n\
                    event: message\n\
                    data: {\"jsonrpc\":\"2.0\",\"id\":7,\"result\":{\"ok\":true}}\n\n";
        let resp = response_from_sse(body, Some(7)).unwrap();
        assert_eq!(resp.result.unwrap()["ok"], true);
        assert!(response_from_sse(body, Some(9)).is_none());
        assert_eq!(response_from_sse(body, None).unwrap().numeric_id(), Some(1));
    }
}
