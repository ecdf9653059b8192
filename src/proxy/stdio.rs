//! Stdio backend: MCP over a child process's stdin/stdout.
//!
//! One writer task drains an outgoing queue into the child's stdin; one
//! reader task parses stdout lines and completes the matching pending
//! request. The child is killed when the backend is dropped.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot, Mutex, OnceCell};
use tracing::{debug, error, info, warn};

use crate::error::{Result, ToolError};
use crate::protocol::{JsonRpcRequest, JsonRpcResponse};
use crate::proxy::{handshake, RpcTransport};

/// Waiters by request id. `None` once the child's output has closed.
type PendingMap = Arc<Mutex<Option<HashMap<u64, oneshot::Sender<JsonRpcResponse>>>>>;

pub struct StdioBackend {
    command: String,
    request_id: AtomicU64,
    outgoing: mpsc::Sender<String>,
    pending: PendingMap,
    timeout: Duration,
    initialized: OnceCell<()>,
    /// Held so the child lives (and dies) with the backend
    _child: Mutex<Child>,
}

impl StdioBackend {
    /// Spawns the server process and starts the I/O tasks.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
        timeout: Duration,
    ) -> Result<Self> {
        info!("Spawning backend process: {} {:?}", command, args);

        let mut child = Command::new(command)
            .args(args)
            .envs(env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ToolError::BackendUnreachable(format!("failed to spawn {}: {}", command, e))
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| ToolError::Internal("child stdin not captured".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ToolError::Internal("child stdout not captured".to_string()))?;

        let (outgoing, mut queue) = mpsc::channel::<String>(32);
        let pending: PendingMap = Arc::new(Mutex::new(Some(HashMap::new())));

        // == Writer Task ==
        let writer_command = command.to_string();
        tokio::spawn(async move {
            while let Some(line) = queue.recv().await {
                let written = async {
                    stdin.write_all(line.as_bytes()).await?;
                    stdin.write_all(b"\n").await?;
                    stdin.flush().await
                }
                .await;
                if let Err(e) = written {
                    error!("Failed to write to {}: {}", writer_command, e);
                    break;
                }
            }
        });

        // == Reader Task ==
        let reader_pending = Arc::clone(&pending);
        let reader_command = command.to_string();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<JsonRpcResponse>(&line) {
                            Ok(response) => {
                                let Some(id) = response.numeric_id() else {
                                    debug!("Ignoring message without numeric id: {}", line);
                                    continue;
                                };
                                let waiter = reader_pending
                                    .lock()
                                    .await
                                    .as_mut()
                                    .and_then(|waiters| waiters.remove(&id));
                                if let Some(waiter) = waiter {
                                    let _ = waiter.send(response);
                                }
                            }
                            Err(e) => debug!("Ignoring non-response line from backend: {}", e),
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!("Failed to read from {}: {}", reader_command, e);
                        break;
                    }
                }
            }
            // Dropping the senders fails every outstanding request; later
            // sends see the closed map and fail immediately.
            reader_pending.lock().await.take();
            info!("Backend process {} closed its output", reader_command);
        });

        Ok(Self {
            command: command.to_string(),
            request_id: AtomicU64::new(1),
            outgoing,
            pending,
            timeout,
            initialized: OnceCell::new(),
            _child: Mutex::new(child),
        })
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    fn next_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::SeqCst)
    }

    async fn forget(&self, id: u64) {
        if let Some(waiters) = self.pending.lock().await.as_mut() {
            waiters.remove(&id);
        }
    }

    async fn write(&self, message: &JsonRpcRequest) -> Result<()> {
        let line = serde_json::to_string(message)
            .map_err(|e| ToolError::Internal(format!("failed to encode request: {}", e)))?;
        self.outgoing.send(line).await.map_err(|_| {
            ToolError::BackendUnreachable(format!("{} is no longer accepting input", self.command))
        })
    }
}

#[async_trait]
impl RpcTransport for StdioBackend {
    async fn send(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let id = self.next_id();
        let (tx, rx) = oneshot::channel();
        match self.pending.lock().await.as_mut() {
            Some(waiters) => {
                waiters.insert(id, tx);
            }
            None => {
                return Err(ToolError::BackendUnreachable(format!(
                    "{} has exited",
                    self.command
                )))
            }
        }

        debug!("Sending {} (id {}) to {}", method, id, self.command);
        if let Err(err) = self.write(&JsonRpcRequest::new(id, method, params)).await {
            self.forget(id).await;
            return Err(err);
        }

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(response)) => response.into_result(),
            Ok(Err(_)) => Err(ToolError::BackendUnreachable(format!(
                "{} exited before answering {}",
                self.command, method
            ))),
            Err(_) => {
                self.forget(id).await;
                Err(ToolError::Timeout(format!(
                    "{} did not answer {} within {}s",
                    self.command,
                    method,
                    self.timeout.as_secs()
                )))
            }
        }
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        self.write(&JsonRpcRequest::notification(method, params)).await
    }

    async fn ensure_initialized(&self) -> Result<()> {
        self.initialized
            .get_or_try_init(|| handshake(self))
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_spawn_missing_command_is_unreachable() {
        let result = StdioBackend::spawn(
            "/definitely/not/a/binary",
            &[],
            &HashMap::new(),
            Duration::from_secs(1),
        );
        assert!(matches!(result, Err(ToolError::BackendUnreachable(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exiting_child_fails_pending_request() {
        let backend = StdioBackend::spawn(
            "sh",
            &["-c".to_string(), "read line; exit 0".to_string()],
            &HashMap::new(),
            Duration::from_secs(5),
        )
        .unwrap();
        let result = backend.send("ping", None).await;
        assert!(matches!(result, Err(ToolError::BackendUnreachable(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_send_after_child_exit_fails_fast() {
        let backend = StdioBackend::spawn(
            "sh",
            &["-c".to_string(), "exit 0".to_string()],
            &HashMap::new(),
            Duration::from_secs(30),
        )
        .unwrap();

        for _ in 0..250 {
            if backend.pending.lock().await.is_none() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(backend.pending.lock().await.is_none());

        for _ in 0..2 {
            let result = tokio::time::timeout(Duration::from_secs(2), backend.send("ping", None))
                .await
                .expect("send should not wait for the backend timeout");
            assert!(matches!(result, Err(ToolError::BackendUnreachable(_))));
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_echo_server_round_trip() {
        // Answers every request line as id 1.
        let script = r#"while read line; do echo '{"jsonrpc":"2.0","id":1,"result":{"pong":true}}'; done"#;
        let backend = StdioBackend::spawn(
            "sh",
            &["-c".to_string(), script.to_string()],
            &HashMap::new(),
            Duration::from_secs(5),
        )
        .unwrap();
        let result = backend.send("ping", None).await.unwrap();
        assert_eq!(result["pong"], true);
    }
}
