//! End-to-end turn flow against a scripted transport and a canned model
//! provider: the "open Safari" scenario from top to bottom.

use async_trait::async_trait;
use deskpilot::model::{ModelError, ModelProvider, ModelRequest, ModelResponse, ToolCallRequest};
use deskpilot::session::Session;
use deskpilot::transport::{ToolTransport, TransportError};
use deskpilot::turn::TurnOrchestrator;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

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

struct CannedProvider {
    response: ModelResponse,
}

#[async_trait]
impl ModelProvider for CannedProvider {
    async fn chat(&self, _request: ModelRequest) -> Result<ModelResponse, ModelError> {
        Ok(ModelResponse {
            content: self.response.content.clone(),
            tool_calls: self.response.tool_calls.clone(),
        })
    }
}

#[tokio::test]
async fn open_safari_scenario_runs_one_tool_call_and_cleans_up_once() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let close_count = Arc::new(AtomicUsize::new(0));
    let transport = ScriptedTransport {
        calls: calls.clone(),
        responses: VecDeque::from(vec![
            json!({}),
            json!({
                "tools": [{
                    "name": "open_app",
                    "description": "Open an application on MacOS",
                    "inputSchema": {
                        "type": "object",
                        "properties": { "name": { "type": "string", "title": "Name" } },
                        "required": ["name"],
                    },
                }],
            }),
            json!({
                "content": [{ "type": "text", "text": "Safari opened" }],
                "isError": false,
            }),
        ]),
        close_count: close_count.clone(),
    };

    let mut session = Session::handshake(transport).await.expect("handshake");
    let provider = CannedProvider {
        response: ModelResponse {
            content: None,
            tool_calls: vec![ToolCallRequest {
                name: "open_app".into(),
                arguments: "{\"name\":\"Safari\"}".into(),
            }],
        },
    };
    let orchestrator = TurnOrchestrator::new(provider, "gpt-4o-mini");

    let answer = orchestrator
        .run_turn(&mut session, "open Safari")
        .await
        .expect("turn succeeds");
    assert!(answer.contains("[Calling tool open_app with args {\"name\":\"Safari\"}]"));

    {
        let recorded = calls.lock().expect("lock");
        let tool_calls: Vec<_> = recorded
            .iter()
            .filter(|(method, _)| method == "tools/call")
            .collect();
        assert_eq!(tool_calls.len(), 1);
        assert_eq!(tool_calls[0].1["name"], "open_app");
        assert_eq!(tool_calls[0].1["arguments"], json!({"name": "Safari"}));
    }

    // Loop exit: cleanup exactly once, even when invoked twice.
    session.cleanup().await.expect("cleanup");
    session.cleanup().await.expect("cleanup again");
    assert_eq!(close_count.load(Ordering::SeqCst), 1);

    // The torn-down session refuses further tool calls.
    let err = session
        .call_tool("open_app", json!({"name": "Safari"}))
        .await
        .expect_err("must fail");
    assert_eq!(err.to_string(), "transport channel is closed");
}
