use crate::application::session::{Session, SessionError};
use crate::domain::types::{ChatMessage, MessageRole};
use crate::infrastructure::model::{ModelError, ModelProvider, ModelRequest, to_function_schemas};
use crate::infrastructure::transport::ToolTransport;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum TurnError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("malformed model response: {reason}")]
    MalformedModelResponse { reason: String },
}

/// Drives one user utterance through the model and, when the model asks
/// for one, through a single tool invocation. One completion per turn;
/// the tool result is folded into the history but not sent back to the
/// model.
pub struct TurnOrchestrator<P: ModelProvider> {
    provider: P,
    model: String,
}

impl<P: ModelProvider> TurnOrchestrator<P> {
    pub fn new(provider: P, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    /// Run a single turn. Decision rule: prefer non-empty content, else
    /// take the first requested tool call, else the response is
    /// malformed. Never more than one tool call per turn.
    pub async fn run_turn<T: ToolTransport>(
        &self,
        session: &mut Session<T>,
        query: &str,
    ) -> Result<String, TurnError> {
        let mut messages = vec![ChatMessage::new(MessageRole::User, query)];
        let tools = to_function_schemas(session.tools());
        debug!(tools = tools.len(), "Requesting completion");

        let response = self
            .provider
            .chat(ModelRequest {
                model: self.model.clone(),
                messages: messages.clone(),
                tools,
            })
            .await?;

        if let Some(content) = response.content.as_deref().filter(|text| !text.is_empty()) {
            return Ok(content.to_string());
        }

        let Some(call) = response.tool_calls.first() else {
            return Err(TurnError::MalformedModelResponse {
                reason: "model reply carried neither content nor a tool call".into(),
            });
        };

        let arguments: Value = serde_json::from_str(&call.arguments).map_err(|err| {
            TurnError::MalformedModelResponse {
                reason: format!("tool call arguments are not valid JSON: {err}"),
            }
        })?;

        info!(tool = %call.name, "Model requested tool invocation");
        let trace = format!("[Calling tool {} with args {}]", call.name, arguments);
        let result = session.call_tool(&call.name, arguments).await?;

        if let Some(content) = response.content.as_deref().filter(|text| !text.is_empty()) {
            messages.push(ChatMessage::new(MessageRole::Assistant, content));
        }
        messages.push(ChatMessage::new(MessageRole::Tool, result.content));
        debug!(history = messages.len(), "Turn complete after tool call");

        Ok(trace)
    }
}
