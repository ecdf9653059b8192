//! HTTP backend: MCP over streamable HTTP POSTs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::error::{Result, ToolError};
use crate::protocol::{response_from_sse, JsonRpcRequest, JsonRpcResponse};
use crate::proxy::{handshake, RpcTransport};

/// Session header assigned by streamable-HTTP servers
pub const SESSION_HEADER: &str = "mcp-session-id";

pub struct HttpBackend {
    url: String,
    client: reqwest::Client,
    request_id: AtomicU64,
    session_id: RwLock<Option<String>>,
    initialized: OnceCell<()>,
}

impl HttpBackend {
    /// Builds the client. Header values are never logged.
    pub fn new(url: impl Into<String>, headers: &HashMap<String, String>, timeout: Duration) -> Result<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json, text/event-stream"),
        );
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| ToolError::InvalidRequest(format!("invalid header name: {}", name)))?;
            let value = HeaderValue::from_str(value).map_err(|_| {
                ToolError::InvalidRequest(format!("invalid value for header {}", name))
            })?;
            default_headers.insert(name, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(default_headers)
            .timeout(timeout)
            .build()
            .map_err(|e| ToolError::Internal(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            url: url.into(),
            client,
            request_id: AtomicU64::new(1),
            session_id: RwLock::new(None),
            initialized: OnceCell::new(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn next_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::SeqCst)
    }

    fn session_id(&self) -> Option<String> {
        self.session_id.read().ok().and_then(|guard| guard.clone())
    }

    fn remember_session(&self, headers: &HeaderMap) {
        let Some(session) = headers.get(SESSION_HEADER).and_then(|v| v.to_str().ok()) else {
            return;
        };
        if let Ok(mut guard) = self.session_id.write() {
            if guard.as_deref() != Some(session) {
                debug!("Backend {} assigned session {}", self.url, session);
                *guard = Some(session.to_string());
            }
        }
    }

    fn transport_error(&self, err: reqwest::Error) -> ToolError {
        if err.is_timeout() {
            ToolError::Timeout(format!("{}: {}", self.url, err))
        } else {
            ToolError::BackendUnreachable(format!("{}: {}", self.url, err))
        }
    }

    async fn post(&self, message: &JsonRpcRequest) -> Result<reqwest::Response> {
        let mut request = self.client.post(&self.url).json(message);
        if let Some(session) = self.session_id() {
            request = request.header(SESSION_HEADER, session);
        }

        let response = request.send().await.map_err(|e| self.transport_error(e))?;
        self.remember_session(response.headers());

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ToolError::BackendRejected(format!(
                "{} answered HTTP {}: {}",
                self.url, status, body
            )));
        }
        Ok(response)
    }
}

#[async_trait]
impl RpcTransport for HttpBackend {
    async fn send(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let id = self.next_id();
        debug!("Sending {} (id {}) to {}", method, id, self.url);
        let response = self.post(&JsonRpcRequest::new(id, method, params)).await?;

        let is_event_stream = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map_or(false, |ct| ct.starts_with("text/event-stream"));
        let body = response.text().await.map_err(|e| self.transport_error(e))?;

        let parsed = if is_event_stream {
            response_from_sse(&body, Some(id)).ok_or_else(|| {
                ToolError::BackendRejected(format!("no response for id {} in event stream", id))
            })?
        } else {
            serde_json::from_str::<JsonRpcResponse>(&body).map_err(|e| {
                ToolError::BackendRejected(format!("malformed JSON-RPC response: {}", e))
            })?
        };
        parsed.into_result()
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        self.post(&JsonRpcRequest::notification(method, params))
            .await
            .map(|_| ())
    }

    async fn ensure_initialized(&self) -> Result<()> {
        self.initialized
            .get_or_try_init(|| handshake(self))
            .await
            .map(|_| ())
    }
}
