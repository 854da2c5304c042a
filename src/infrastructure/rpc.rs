//! Server side of the transport: line-delimited JSON-RPC 2.0 over
//! stdin/stdout, serving `initialize`, `tools/list`, and `tools/call`
//! against a [`ToolRegistry`].

use crate::application::registry::{RegistryError, ToolRegistry};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, warn};

pub const PROTOCOL_VERSION: &str = "2025-06-18";

#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct RpcResponse {
    jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Serialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

impl RpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Option<Value>, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(RpcErrorBody {
                code,
                message: message.into(),
            }),
        }
    }

    pub fn method_not_found(id: Option<Value>, method: &str) -> Self {
        Self::error(id, -32601, format!("method '{method}' is not supported"))
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::error(None, -32600, message)
    }

    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::error(None, -32700, message)
    }

    #[cfg(test)]
    fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    #[cfg(test)]
    fn error_code(&self) -> Option<i64> {
        self.error.as_ref().map(|body| body.code)
    }
}

/// Serve the registry until stdin closes. Malformed lines get an error
/// response and the loop continues; the server never dies on bad input.
pub async fn serve(registry: &ToolRegistry) -> Result<(), io::Error> {
    let stdin = BufReader::new(io::stdin());
    let mut lines = stdin.lines();
    let mut stdout = io::stdout();

    while let Some(line) = lines.next_line().await? {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<RpcRequest>(trimmed) {
            Ok(request) => handle_request(registry, request).await,
            Err(err) => {
                warn!(%err, "Received invalid JSON-RPC line");
                Some(RpcResponse::parse_error(err.to_string()))
            }
        };

        if let Some(response) = response {
            let mut payload = serde_json::to_vec(&response)
                .map_err(|err| io::Error::other(err.to_string()))?;
            payload.push(b'\n');
            stdout.write_all(&payload).await?;
            stdout.flush().await?;
        }
    }

    debug!("stdin closed; tool server shutting down");
    Ok(())
}

/// Handle one request. Returns `None` for notifications, which expect no
/// response.
pub async fn handle_request(registry: &ToolRegistry, request: RpcRequest) -> Option<RpcResponse> {
    if request.method.starts_with("notifications/") {
        debug!(method = %request.method, "Ignoring notification");
        return None;
    }
    if request.jsonrpc != "2.0" {
        return Some(RpcResponse::invalid_request(
            "unsupported jsonrpc version (expected 2.0)",
        ));
    }

    debug!(method = %request.method, "Handling JSON-RPC request");
    let response = match request.method.as_str() {
        "initialize" => RpcResponse::success(
            request.id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "serverInfo": {
                    "name": env!("CARGO_PKG_NAME"),
                    "version": env!("CARGO_PKG_VERSION"),
                },
                "capabilities": { "tools": {} },
            }),
        ),
        "tools/list" => RpcResponse::success(
            request.id,
            json!({
                "tools": registry
                    .descriptors()
                    .map(|descriptor| descriptor.to_wire())
                    .collect::<Vec<_>>(),
            }),
        ),
        "tools/call" => handle_tool_call(registry, request.id, request.params).await,
        other => RpcResponse::method_not_found(request.id, other),
    };
    Some(response)
}

async fn handle_tool_call(
    registry: &ToolRegistry,
    id: Option<Value>,
    params: Option<Value>,
) -> RpcResponse {
    let Some(params) = params else {
        return RpcResponse::error(id, -32602, "params must be an object with a tool name");
    };
    let Some(name) = params.get("name").and_then(Value::as_str) else {
        return RpcResponse::error(id, -32602, "params.name must be a string");
    };
    let arguments = params.get("arguments").cloned().unwrap_or_else(|| json!({}));

    match registry.dispatch(name, arguments).await {
        Ok(text) => RpcResponse::success(
            id,
            json!({
                "content": [{ "type": "text", "text": text }],
                "isError": false,
            }),
        ),
        Err(RegistryError::UnknownTool(name)) => {
            RpcResponse::error(id, -32602, format!("unknown tool '{name}'"))
        }
        Err(err @ RegistryError::Execution { .. }) => {
            warn!(%err, "Tool execution failed");
            RpcResponse::success(
                id,
                json!({
                    "content": [{ "type": "text", "text": err.to_string() }],
                    "isError": true,
                }),
            )
        }
    }
}
