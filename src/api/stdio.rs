//! Stdio Transport
//!
//! Newline-delimited JSON-RPC: one request per input line, one response per
//! output line. Logs must go to stderr while this runs.

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info};

use crate::api::rpc::{handle_request, parse_message};
use crate::tools::ToolHost;

/// Serves requests until `input` reaches end of file.
pub async fn serve<R, W>(host: Arc<dyn ToolHost>, input: R, mut output: W) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let response = match parse_message(&line) {
            Ok(request) => {
                debug!("stdio request: {}", request.method);
                handle_request(host.as_ref(), request).await
            }
            Err(error_response) => Some(error_response),
        };

        if let Some(response) = response {
            let mut encoded = serde_json::to_vec(&response)?;
            encoded.push(b'\n');
            output.write_all(&encoded).await?;
            output.flush().await?;
        }
    }
    info!("stdin closed, stopping stdio server");
    Ok(())
}

/// Serves on the process's own stdin/stdout.
pub async fn serve_stdio(host: Arc<dyn ToolHost>) -> std::io::Result<()> {
    info!("Serving MCP over stdio ({} mode)", host.mode());
    serve(host, BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await
}
