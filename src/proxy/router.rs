//! Prefix Router
//!
//! Ordered routing table of `(prefix, backend)`. A tool named
//! `prefix_rest` goes to the backend registered under the longest matching
//! prefix, as `rest`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{Result, ToolError};
use crate::protocol::prompt_result;
use crate::proxy::{Backend, BackendConfig};
use crate::tools::{PromptDescriptor, ToolDescriptor, ToolHost, ToolRegistry};

/// Router-level prompt describing every backend's tools
pub const UNIFIED_WORKFLOW_PROMPT: &str = "unified_workflow";

pub struct Route {
    pub prefix: String,
    pub backend: Backend,
}

pub struct ProxyRouter {
    routes: Vec<Route>,
}

impl ProxyRouter {
    /// Builds the table. Prefixes must be non-empty and unique.
    pub fn new(routes: Vec<Route>) -> Result<Self> {
        for (i, route) in routes.iter().enumerate() {
            if route.prefix.is_empty() {
                return Err(ToolError::InvalidRequest(
                    "backend prefix must not be empty".to_string(),
                ));
            }
            if routes[..i].iter().any(|r| r.prefix == route.prefix) {
                return Err(ToolError::InvalidRequest(format!(
                    "duplicate backend prefix: {}",
                    route.prefix
                )));
            }
        }
        Ok(Self { routes })
    }

    /// Connects every configured backend and builds the table.
    pub fn from_configs(
        configs: &[BackendConfig],
        local: Option<&Arc<ToolRegistry>>,
        timeout: Duration,
    ) -> Result<Self> {
        let routes = configs
            .iter()
            .map(|config| {
                info!("Backend {:?}", config);
                Backend::connect(config, local, timeout).map(|backend| Route {
                    prefix: config.prefix.clone(),
                    backend,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(routes)
    }

    pub fn prefixes(&self) -> Vec<&str> {
        self.routes.iter().map(|r| r.prefix.as_str()).collect()
    }

    /// Finds the route for `name` and the name to forward.
    ///
    /// A prefix matches when `name` is `prefix + "_" + rest` with a
    /// non-empty `rest`; among matches the longest prefix wins.
    pub fn resolve<'a>(&self, name: &'a str) -> Option<(&Route, &'a str)> {
        self.routes
            .iter()
            .filter_map(|route| {
                name.strip_prefix(route.prefix.as_str())
                    .and_then(|rest| rest.strip_prefix('_'))
                    .filter(|rest| !rest.is_empty())
                    .map(|rest| (route, rest))
            })
            .max_by_key(|(route, _)| route.prefix.len())
    }

    /// Text of the router's own prompt, listing the merged tools by backend.
    fn unified_workflow(&self, tools: &[ToolDescriptor]) -> String {
        let mut text = String::from(
            "Unified workflow\n\n\
             Every tool name starts with the prefix of the backend serving it; \
             the prefix is stripped before the call is forwarded.\n",
        );
        for route in &self.routes {
            text.push_str(&format!(
                "\nBackend {} (prefix: {}_, {}):\n",
                route.prefix,
                route.prefix,
                route.backend.kind()
            ));
            let served: Vec<&ToolDescriptor> = tools
                .iter()
                .filter(|tool| {
                    self.resolve(&tool.name)
                        .map_or(false, |(owner, _)| owner.prefix == route.prefix)
                })
                .collect();
            if served.is_empty() {
                text.push_str("  (no tools available)\n");
            }
            for tool in served {
                text.push_str(&format!("  - {}: {}\n", tool.name, tool.description));
            }
        }
        text.push_str(
            "\nTypical flow: prepare a local folder, fetch the cached payload, \
             upload it through a remote tool, start and monitor the remote task, \
             then save downloaded results locally.\n",
        );
        text
    }
}

#[async_trait]
impl ToolHost for ProxyRouter {
    fn mode(&self) -> &'static str {
        "proxy"
    }

    /// Union of every reachable backend's tools, names prefixed.
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        let listings = join_all(self.routes.iter().map(|route| route.backend.list_tools())).await;

        let mut tools = Vec::new();
        for (route, listing) in self.routes.iter().zip(listings) {
            match listing {
                Ok(found) => tools.extend(found.into_iter().map(|mut tool| {
                    tool.name = format!("{}_{}", route.prefix, tool.name);
                    tool
                })),
                Err(err) => warn!(
                    "Skipping tools of backend {} ({}): {}",
                    route.prefix,
                    route.backend.kind(),
                    err
                ),
            }
        }
        Ok(tools)
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value> {
        let (route, tool) = self
            .resolve(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        debug!(
            "Routing {} to backend {} ({}) as {}",
            name,
            route.prefix,
            route.backend.kind(),
            tool
        );
        route.backend.call_tool(tool, arguments).await
    }

    /// The router's own prompt followed by every backend's prompts, prefixed.
    async fn list_prompts(&self) -> Result<Vec<PromptDescriptor>> {
        let listings = join_all(self.routes.iter().map(|route| route.backend.list_prompts())).await;

        let mut prompts = vec![PromptDescriptor::new(
            UNIFIED_WORKFLOW_PROMPT,
            "Complete workflow across all routed backends",
        )];
        for (route, listing) in self.routes.iter().zip(listings) {
            match listing {
                Ok(found) => prompts.extend(found.into_iter().map(|mut prompt| {
                    prompt.name = format!("{}_{}", route.prefix, prompt.name);
                    prompt
                })),
                Err(err) => debug!("No prompts from backend {}: {}", route.prefix, err),
            }
        }
        Ok(prompts)
    }

    async fn get_prompt(&self, name: &str) -> Result<Value> {
        if name == UNIFIED_WORKFLOW_PROMPT {
            let tools = self.list_tools().await?;
            return Ok(prompt_result(
                "Complete workflow across all routed backends",
                &self.unified_workflow(&tools),
            ));
        }
        let (route, prompt) = self
            .resolve(name)
            .ok_or_else(|| ToolError::UnknownPrompt(name.to_string()))?;
        debug!("Routing prompt {} to backend {} as {}", name, route.prefix, prompt);
        route.backend.get_prompt(prompt).await
    }
}
