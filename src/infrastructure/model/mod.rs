mod adapter;
mod openai;

pub use adapter::{FunctionSchema, to_function_schemas};
pub use openai::OpenAiClient;

use crate::domain::types::ChatMessage;
use async_trait::async_trait;
use thiserror::Error;

/// One completion request: full conversation history plus the adapted tool
/// schemas for this session.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<FunctionSchema>,
}

/// A tool invocation the model asked for. `arguments` is the raw JSON
/// string from the wire; the orchestrator parses it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCallRequest {
    pub name: String,
    pub arguments: String,
}

/// The single message a completion returns: free text, tool calls, or
/// (from a misbehaving model) neither.
#[derive(Debug, Clone, Default)]
pub struct ModelResponse {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCallRequest>,
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("network error calling model provider: {source}")]
    Network {
        #[source]
        source: reqwest::Error,
    },
    #[error("model provider returned invalid response: {reason}")]
    InvalidResponse { reason: String },
}

#[async_trait]
pub trait ModelProvider: Send + Sync {
    async fn chat(&self, request: ModelRequest) -> Result<ModelResponse, ModelError>;
}
