//! API Handlers
//!
//! HTTP request handlers for the JSON-RPC endpoint and the REST helpers.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::api::rpc::{handle_request, parse_message};
use crate::cache::{self, CacheStore, SharedCache};
use crate::config::{Config, ServerMode};
use crate::error::Result;
use crate::models::{HealthResponse, StatsResponse};
use crate::proxy::ProxyRouter;
use crate::tools::{ToolContext, ToolDefaults, ToolHost, ToolRegistry};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Registry or router answering tool calls
    pub host: Arc<dyn ToolHost>,
    /// The local payload cache (also reachable through the host's tools)
    pub cache: SharedCache,
}

impl AppState {
    pub fn new(host: Arc<dyn ToolHost>, cache: SharedCache) -> Self {
        Self { host, cache }
    }

    /// State serving only the built-in local tools.
    pub fn local(store: CacheStore, defaults: ToolDefaults) -> Self {
        let cache = cache::shared(store);
        let ctx = ToolContext::new(cache.clone(), defaults).into_shared();
        Self::new(Arc::new(ToolRegistry::with_builtin_tools(ctx)), cache)
    }

    /// Builds the cache, the local registry and, in proxy mode, the router.
    ///
    /// Stdio backends are spawned here, so this must run inside the runtime.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let cache = cache::shared(CacheStore::new(config.cache_ttl));
        let defaults = ToolDefaults {
            max_file_size: config.max_file_size,
            skip_patterns: config.skip_patterns.clone(),
        };
        let ctx = ToolContext::new(cache.clone(), defaults).into_shared();
        let registry = Arc::new(ToolRegistry::with_builtin_tools(ctx));

        let host: Arc<dyn ToolHost> = match config.mode {
            ServerMode::Local => registry,
            ServerMode::Proxy => {
                let router = ProxyRouter::from_configs(
                    &config.backends,
                    Some(&registry),
                    Duration::from_secs(config.forward_timeout),
                )?;
                info!("Routing prefixes: {:?}", router.prefixes());
                Arc::new(router)
            }
        };
        Ok(Self::new(host, cache))
    }
}

/// Handler for POST /mcp
///
/// One JSON-RPC message per request. Notifications are acknowledged with
/// 202 and no body.
pub async fn mcp_handler(State(state): State<AppState>, body: String) -> Response {
    let response = match parse_message(&body) {
        Ok(request) => handle_request(state.host.as_ref(), request).await,
        Err(error_response) => Some(error_response),
    };
    match response {
        Some(response) => Json(response).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

/// Handler for GET /tools
pub async fn list_tools_handler(State(state): State<AppState>) -> Result<Json<Value>> {
    let tools = state.host.list_tools().await?;
    Ok(Json(json!({ "tools": tools })))
}

#[derive(Debug, Default, Deserialize)]
pub struct CallQuery {
    pub timeout_ms: Option<u64>,
}

/// Handler for POST /tools/:name
///
/// The body is the argument object; the answer is the tool envelope.
/// Routing failures map to HTTP status codes through `ToolError`.
pub async fn call_tool_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<CallQuery>,
    body: Option<Json<Value>>,
) -> Result<Json<Value>> {
    let arguments = body.map(|Json(v)| v).unwrap_or(Value::Null);
    let envelope = match query.timeout_ms {
        Some(ms) => {
            state
                .host
                .call_tool_with_timeout(&name, arguments, Duration::from_millis(ms))
                .await?
        }
        None => state.host.call_tool(&name, arguments).await?,
    };
    Ok(Json(envelope))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let cache = state.cache.read().await;
    let stats = cache.stats();

    Json(StatsResponse::new(
        stats.hits,
        stats.misses,
        stats.expirations,
        stats.total_entries,
    ))
}

/// Handler for GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::healthy(state.host.mode()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ToolError;

    fn state() -> AppState {
        AppState::local(CacheStore::new(3600), ToolDefaults::default())
    }

    #[tokio::test]
    async fn test_list_tools_handler() {
        let Json(body) = list_tools_handler(State(state())).await.unwrap();
        assert_eq!(body["tools"].as_array().unwrap().len(), 9);
    }

    #[tokio::test]
    async fn test_call_unknown_tool_is_err() {
        let result = call_tool_handler(
            State(state()),
            Path("nope".to_string()),
            Query(CallQuery::default()),
            None,
        )
        .await;
        assert!(matches!(result, Err(ToolError::UnknownTool(_))));
    }

    #[tokio::test]
    async fn test_call_tool_returns_envelope() {
        let Json(envelope) = call_tool_handler(
            State(state()),
            Path("clear_cache".to_string()),
            Query(CallQuery::default()),
            None,
        )
        .await
        .unwrap();
        assert_eq!(envelope["success"], true);
        assert_eq!(envelope["active_caches"], 0);
    }

    #[tokio::test]
    async fn test_stats_handler() {
        let response = stats_handler(State(state())).await;
        assert_eq!(response.hits, 0);
        assert_eq!(response.misses, 0);
        assert_eq!(response.total_entries, 0);
    }

    #[tokio::test]
    async fn test_health_handler_reports_mode() {
        let response = health_handler(State(state())).await;
        assert_eq!(response.status, "healthy");
        assert_eq!(response.mode, "local");
    }

    #[tokio::test]
    async fn test_from_config_proxy_mode() {
        let config = Config {
            mode: ServerMode::Proxy,
            ..Config::default()
        };
        let state = AppState::from_config(&config).unwrap();
        assert_eq!(state.host.mode(), "proxy");
        let tools = state.host.list_tools().await.unwrap();
        assert!(tools.iter().all(|t| t.name.starts_with("local_")));
    }
}
