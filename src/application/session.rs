use crate::config::AgentConfig;
use crate::domain::types::{SchemaViolation, ToolDescriptor, ToolOutput};
use crate::infrastructure::transport::{StdioTransport, ToolTransport, TransportError};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, info, warn};

const PROTOCOL_VERSION: &str = "2025-06-18";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("unsupported tool server script '{path}': expected a .py or .js file")]
    UnsupportedServerKind { path: String },
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("unknown tool requested: {0}")]
    UnknownTool(String),
    #[error("tool '{tool}' failed: {message}")]
    ToolExecution { tool: String, message: String },
    #[error("tool server declared an invalid descriptor for '{tool}': {source}")]
    InvalidDescriptor {
        tool: String,
        #[source]
        source: SchemaViolation,
    },
}

/// The interpreter a tool server script runs under, selected by file
/// extension. Anything else is rejected before a process is spawned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerKind {
    Python,
    Node,
}

impl ServerKind {
    pub fn from_path(path: &str) -> Option<Self> {
        if path.ends_with(".py") {
            Some(ServerKind::Python)
        } else if path.ends_with(".js") {
            Some(ServerKind::Node)
        } else {
            None
        }
    }

    pub fn command(self) -> &'static str {
        match self {
            ServerKind::Python => "python",
            ServerKind::Node => "node",
        }
    }
}

/// One live connection to a tool server: the transport plus the tool
/// catalogue discovered during the handshake. Exactly one session exists
/// per agent process; the catalogue is valid only until `cleanup`.
#[derive(Debug)]
pub struct Session<T: ToolTransport> {
    transport: T,
    catalog: Vec<ToolDescriptor>,
    open: bool,
}

impl Session<StdioTransport> {
    /// Validate the server path, spawn the interpreter, perform the
    /// initialize handshake, and cache the tool catalogue.
    pub async fn connect(config: &AgentConfig) -> Result<Self, SessionError> {
        let kind = ServerKind::from_path(&config.server_path).ok_or_else(|| {
            SessionError::UnsupportedServerKind {
                path: config.server_path.clone(),
            }
        })?;
        debug!(command = kind.command(), script = %config.server_path, "Spawning tool server");
        let transport = StdioTransport::open(
            kind.command(),
            &[config.server_path.as_str()],
            config.request_timeout,
        )?;
        Self::handshake(transport).await
    }
}

impl<T: ToolTransport> Session<T> {
    /// Run the initialize and tools/list exchange over an already-open
    /// transport. Public so alternative transports can be plugged in.
    pub async fn handshake(mut transport: T) -> Result<Self, SessionError> {
        transport
            .request(
                "initialize",
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "clientInfo": {
                        "name": env!("CARGO_PKG_NAME"),
                        "version": env!("CARGO_PKG_VERSION"),
                    },
                    "capabilities": {},
                }),
            )
            .await?;

        let listed = transport.request("tools/list", json!({})).await?;
        let catalog = parse_catalog(&listed)?;
        info!(
            tools = ?catalog.iter().map(|tool| tool.name.as_str()).collect::<Vec<_>>(),
            "Connected to tool server"
        );

        Ok(Self {
            transport,
            catalog,
            open: true,
        })
    }

    /// The cached catalogue. Not re-queried unless a new session is made.
    pub fn tools(&self) -> &[ToolDescriptor] {
        &self.catalog
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Invoke a tool by name. The name is checked against the cached
    /// catalogue before anything is sent, so a model hallucinating a tool
    /// costs no RPC.
    pub async fn call_tool(&mut self, name: &str, args: Value) -> Result<ToolOutput, SessionError> {
        if !self.open {
            return Err(SessionError::Transport(TransportError::Closed));
        }
        if !self.catalog.iter().any(|tool| tool.name == name) {
            warn!(tool = name, "Rejected call to tool absent from catalogue");
            return Err(SessionError::UnknownTool(name.to_string()));
        }

        let result = self
            .transport
            .request(
                "tools/call",
                json!({
                    "name": name,
                    "arguments": args,
                }),
            )
            .await?;

        let content = collect_text_content(&result);
        if result
            .get("isError")
            .and_then(Value::as_bool)
            .unwrap_or(false)
        {
            return Err(SessionError::ToolExecution {
                tool: name.to_string(),
                message: if content.is_empty() {
                    "tool reported an error".to_string()
                } else {
                    content
                },
            });
        }

        Ok(ToolOutput { content })
    }

    /// Release the transport. Idempotent; a second call is a no-op.
    pub async fn cleanup(&mut self) -> Result<(), SessionError> {
        if !self.open {
            return Ok(());
        }
        self.open = false;
        debug!("Tearing down tool server session");
        self.transport.close().await?;
        Ok(())
    }
}

fn parse_catalog(listed: &Value) -> Result<Vec<ToolDescriptor>, SessionError> {
    let entries = listed
        .get("tools")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut catalog = Vec::with_capacity(entries.len());
    for entry in &entries {
        let tool_name = entry
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("<unnamed>")
            .to_string();
        let descriptor =
            ToolDescriptor::from_wire(entry).map_err(|source| SessionError::InvalidDescriptor {
                tool: tool_name,
                source,
            })?;
        catalog.push(descriptor);
    }
    Ok(catalog)
}

fn collect_text_content(result: &Value) -> String {
    result
        .get("content")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Scripted transport: answers requests from a queue and records
    /// every call for later inspection.
    #[derive(Debug)]
    struct ScriptedTransport {
        calls: Arc<Mutex<Vec<(String, Value)>>>,
        responses: VecDeque<Value>,
        close_count: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ToolTransport for ScriptedTransport {
        async fn request(&mut self, method: &str, params: Value) -> Result<Value, TransportError> {
            self.calls
                .lock()
                .expect("call log lock")
                .push((method.to_string(), params));
            self.responses.pop_front().ok_or(TransportError::Closed)
        }

        async fn close(&mut self) -> Result<(), TransportError> {
            self.close_count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn catalog_wire() -> Value {
        json!({
            "tools": [{
                "name": "open_app",
                "description": "Open an application",
                "inputSchema": {
                    "type": "object",
                    "properties": { "name": { "type": "string", "title": "Name" } },
                    "required": ["name"],
                },
            }],
        })
    }

    struct Harness {
        calls: Arc<Mutex<Vec<(String, Value)>>>,
        close_count: Arc<AtomicUsize>,
    }

    async fn session_with(
        extra_responses: Vec<Value>,
    ) -> (Session<ScriptedTransport>, Harness) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let close_count = Arc::new(AtomicUsize::new(0));
        let mut responses = VecDeque::from(vec![json!({}), catalog_wire()]);
        responses.extend(extra_responses);
        let transport = ScriptedTransport {
            calls: calls.clone(),
            responses,
            close_count: close_count.clone(),
        };
        let session = Session::handshake(transport).await.expect("handshake");
        (
            session,
            Harness { calls, close_count },
        )
    }

    #[test]
    fn server_kind_is_selected_by_extension() {
        assert_eq!(ServerKind::from_path("server.py"), Some(ServerKind::Python));
        assert_eq!(ServerKind::from_path("server.js"), Some(ServerKind::Node));
        assert_eq!(ServerKind::from_path("server.sh"), None);
        assert_eq!(ServerKind::from_path("server"), None);
    }

    #[tokio::test]
    async fn connect_rejects_unsupported_extension_without_spawning() {
        let config = AgentConfig {
            model: "gpt-4o-mini".into(),
            server_path: "server.sh".into(),
            api_base: "http://localhost".into(),
            api_key: None,
            request_timeout: std::time::Duration::from_secs(1),
        };
        let err = Session::connect(&config).await.expect_err("must fail");
        assert!(matches!(err, SessionError::UnsupportedServerKind { path } if path == "server.sh"));
    }

    #[tokio::test]
    async fn handshake_caches_the_catalogue() {
        let (session, harness) = session_with(Vec::new()).await;
        assert_eq!(session.tools().len(), 1);
        assert_eq!(session.tools()[0].name, "open_app");

        let calls = harness.calls.lock().expect("lock");
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].0, "initialize");
        assert_eq!(calls[1].0, "tools/list");
    }

    #[tokio::test]
    async fn handshake_fails_fast_on_invalid_descriptor() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let transport = ScriptedTransport {
            calls,
            responses: VecDeque::from(vec![
                json!({}),
                json!({
                    "tools": [{
                        "name": "weird",
                        "inputSchema": {
                            "type": "object",
                            "properties": { "x": { "type": "integer" } },
                        },
                    }],
                }),
            ]),
            close_count: Arc::new(AtomicUsize::new(0)),
        };
        let err = Session::handshake(transport).await.expect_err("must fail");
        assert!(matches!(err, SessionError::InvalidDescriptor { tool, .. } if tool == "weird"));
    }

    #[tokio::test]
    async fn call_tool_sends_rpc_and_returns_content() {
        let (mut session, harness) = session_with(vec![json!({
            "content": [{ "type": "text", "text": "done" }],
            "isError": false,
        })])
        .await;

        let output = session
            .call_tool("open_app", json!({"name": "Safari"}))
            .await
            .expect("call succeeds");
        assert_eq!(output.content, "done");

        let calls = harness.calls.lock().expect("lock");
        assert_eq!(calls[2].0, "tools/call");
        assert_eq!(calls[2].1["name"], "open_app");
        assert_eq!(calls[2].1["arguments"]["name"], "Safari");
    }

    #[tokio::test]
    async fn call_tool_rejects_unknown_name_without_rpc() {
        let (mut session, harness) = session_with(Vec::new()).await;
        let err = session
            .call_tool("missing_tool", json!({}))
            .await
            .expect_err("must fail");
        assert!(matches!(err, SessionError::UnknownTool(name) if name == "missing_tool"));
        // Only the two handshake calls went over the wire.
        assert_eq!(harness.calls.lock().expect("lock").len(), 2);
    }

    #[tokio::test]
    async fn server_reported_failure_surfaces_as_tool_execution() {
        let (mut session, _harness) = session_with(vec![json!({
            "content": [{ "type": "text", "text": "Error: no such app" }],
            "isError": true,
        })])
        .await;

        let err = session
            .call_tool("open_app", json!({"name": "Nope"}))
            .await
            .expect_err("must fail");
        assert!(
            matches!(err, SessionError::ToolExecution { tool, message }
                if tool == "open_app" && message.contains("no such app"))
        );
    }

    #[tokio::test]
    async fn call_after_cleanup_fails_with_transport_error() {
        let (mut session, _harness) = session_with(vec![json!({"content": []})]).await;
        session.cleanup().await.expect("cleanup");
        let err = session
            .call_tool("open_app", json!({"name": "Safari"}))
            .await
            .expect_err("must fail");
        assert!(matches!(
            err,
            SessionError::Transport(TransportError::Closed)
        ));
    }

    #[tokio::test]
    async fn cleanup_is_idempotent() {
        let (mut session, harness) = session_with(Vec::new()).await;
        session.cleanup().await.expect("first cleanup");
        session.cleanup().await.expect("second cleanup");
        assert_eq!(harness.close_count.load(Ordering::SeqCst), 1);
        assert!(!session.is_open());
    }
}
