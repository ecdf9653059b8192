//! API Module
//!
//! Serves the tool host over HTTP (axum) or stdio.
//!
//! # Endpoints
//! - `POST /mcp` - JSON-RPC (MCP) requests
//! - `GET /tools` - List tools
//! - `POST /tools/:name` - Call a tool with the body as arguments
//! - `GET /stats` - Cache statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;
pub mod rpc;
pub mod stdio;

pub use handlers::*;
pub use routes::create_router;
pub use stdio::serve_stdio;
