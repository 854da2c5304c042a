use async_trait::async_trait;
use serde_json::{Value, json};
use std::io;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::debug;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to spawn tool server process `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("transport channel is closed")]
    Closed,
    #[error("timed out after {timeout:?} waiting for a response to '{method}'")]
    Timeout { method: String, timeout: Duration },
    #[error("transport I/O error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
    #[error("failed to encode request: {source}")]
    Encode {
        #[from]
        source: serde_json::Error,
    },
    #[error("tool server returned JSON-RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
}

/// The RPC surface the session manager talks through. The shipped
/// implementation is [`StdioTransport`]; tests substitute their own.
#[async_trait]
pub trait ToolTransport: Send {
    async fn request(&mut self, method: &str, params: Value) -> Result<Value, TransportError>;

    /// Release the channel and any resources it spawned. Idempotent.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Line-delimited JSON-RPC 2.0 over a child process's stdin/stdout.
/// Strictly synchronous: one request, then read until the matching
/// response id arrives. No pipelining.
#[derive(Debug)]
pub struct StdioTransport {
    child: Option<Child>,
    writer: Option<BufWriter<ChildStdin>>,
    reader: Option<BufReader<ChildStdout>>,
    request_timeout: Duration,
    next_id: u64,
}

impl StdioTransport {
    /// Spawn the counterpart process and capture its streams. The child's
    /// stderr is inherited so its diagnostics stay visible.
    pub fn open(
        command: &str,
        args: &[&str],
        request_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let mut child = Command::new(command)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| TransportError::Spawn {
                command: command.to_string(),
                source,
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| io::Error::other("failed to capture tool server stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("failed to capture tool server stdout"))?;

        Ok(Self {
            child: Some(child),
            writer: Some(BufWriter::new(stdin)),
            reader: Some(BufReader::new(stdout)),
            request_timeout,
            next_id: 1,
        })
    }
}

#[async_trait]
impl ToolTransport for StdioTransport {
    async fn request(&mut self, method: &str, params: Value) -> Result<Value, TransportError> {
        let id = self.next_id;
        self.next_id += 1;
        let timeout = self.request_timeout;

        let payload = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        let mut encoded = serde_json::to_vec(&payload)?;
        encoded.push(b'\n');

        let writer = self.writer.as_mut().ok_or(TransportError::Closed)?;
        writer.write_all(&encoded).await?;
        writer.flush().await?;

        let reader = self.reader.as_mut().ok_or(TransportError::Closed)?;
        tokio::time::timeout(timeout, read_matching_response(reader, id))
            .await
            .map_err(|_| TransportError::Timeout {
                method: method.to_string(),
                timeout,
            })?
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.writer.take();
        self.reader.take();
        if let Some(mut child) = self.child.take() {
            if let Err(err) = child.kill().await {
                debug!(%err, "tool server process already exited");
            }
            let _ = child.wait().await;
        }
        Ok(())
    }
}

/// Read lines until the response carrying `id` arrives. Non-JSON lines
/// (server log noise) and unrelated messages are skipped.
async fn read_matching_response(
    reader: &mut BufReader<ChildStdout>,
    id: u64,
) -> Result<Value, TransportError> {
    let mut line = String::new();
    loop {
        line.clear();
        let read = reader.read_line(&mut line).await?;
        if read == 0 {
            return Err(TransportError::Closed);
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let value: Value = match serde_json::from_str(trimmed) {
            Ok(value) => value,
            Err(_) => {
                debug!(line = trimmed, "skipping non-JSON line from tool server");
                continue;
            }
        };

        if value.get("id").and_then(Value::as_u64) != Some(id) {
            debug!("skipping message with unrelated id");
            continue;
        }

        if let Some(error) = value.get("error") {
            let code = error.get("code").and_then(Value::as_i64).unwrap_or(-32000);
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            return Err(TransportError::Rpc { code, message });
        }

        return Ok(value.get("result").cloned().unwrap_or(Value::Null));
    }
}
