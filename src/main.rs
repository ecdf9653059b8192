//! MCP Bridge server binary
//!
//! Reads its configuration from the environment and serves either HTTP or
//! newline-delimited JSON-RPC on stdin/stdout.

use std::net::SocketAddr;

use anyhow::Context;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mcp_bridge::api::{create_router, serve_stdio};
use mcp_bridge::{spawn_cleanup_task, AppState, Config, Transport};

/// Main entry point.
///
/// # Startup Sequence
/// 1. Initialize tracing (always on stderr, stdout may carry protocol frames)
/// 2. Load and validate configuration from environment variables
/// 3. Build the cache, the tool registry and, in proxy mode, the router
/// 4. Start the optional expiry sweep
/// 5. Serve on the configured transport until shutdown
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mcp_bridge=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::from_env().context("failed to load configuration")?;
    config.validate()?;
    info!(
        "Configuration loaded: mode={}, transport={:?}, cache_ttl={}s, cleanup_interval={}s",
        config.mode, config.transport, config.cache_ttl, config.cleanup_interval
    );

    let state = AppState::from_config(&config)?;
    info!("Serving {} tool host", state.host.mode());

    let cleanup_handle = (config.cleanup_interval > 0)
        .then(|| spawn_cleanup_task(state.cache.clone(), config.cleanup_interval));

    match config.transport {
        Transport::Stdio => {
            serve_stdio(state.host.clone()).await?;
            if let Some(handle) = cleanup_handle {
                handle.abort();
            }
        }
        Transport::Http => {
            let addr: SocketAddr = format!("{}:{}", config.server_host, config.server_port)
                .parse()
                .with_context(|| {
                    format!("invalid bind address {}:{}", config.server_host, config.server_port)
                })?;
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("failed to bind {}", addr))?;
            info!("Server listening on http://{}/mcp", addr);

            axum::serve(listener, create_router(state))
                .with_graceful_shutdown(shutdown_signal(cleanup_handle))
                .await?;
        }
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for Ctrl+C or SIGTERM, then stops the sweep task.
async fn shutdown_signal(cleanup_handle: Option<JoinHandle<()>>) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    if let Some(handle) = cleanup_handle {
        handle.abort();
        warn!("Cleanup task aborted");
    }
}
