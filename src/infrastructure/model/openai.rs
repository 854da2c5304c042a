//! OpenAI-compatible chat-completion client. Works against OpenAI itself
//! or any API that speaks the same shape (Ollama, Groq, etc.); when no
//! API key is configured the auth header is simply omitted.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{FunctionSchema, ModelError, ModelProvider, ModelRequest, ModelResponse, ToolCallRequest};
use crate::config::AgentConfig;
use crate::domain::types::ChatMessage;

#[derive(Clone)]
pub struct OpenAiClient {
    http: Client,
    api_base: String,
    api_key: Option<String>,
}

impl OpenAiClient {
    pub fn from_config(config: &AgentConfig) -> Self {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .unwrap_or_default();
        Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }
}

#[async_trait]
impl ModelProvider for OpenAiClient {
    async fn chat(&self, request: ModelRequest) -> Result<ModelResponse, ModelError> {
        let url = format!("{}/chat/completions", self.api_base);
        let payload = ChatCompletionRequest {
            model: &request.model,
            messages: request.messages.iter().map(WireMessage::from).collect(),
            tools: if request.tools.is_empty() {
                None
            } else {
                Some(&request.tools)
            },
            stream: false,
        };

        info!(
            model = request.model.as_str(),
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending chat completion request"
        );

        let mut builder = self
            .http
            .post(&url)
            .header("Content-Type", "application/json");
        if let Some(key) = self.api_key.as_deref() {
            builder = builder.header("Authorization", format!("Bearer {key}"));
        }

        let response: ChatCompletionResponse = builder
            .json(&payload)
            .send()
            .await
            .map_err(|source| ModelError::Network { source })?
            .error_for_status()
            .map_err(|source| ModelError::Network { source })?
            .json()
            .await
            .map_err(|source| ModelError::Network { source })?;
        debug!("Received chat completion response");

        let message = response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| ModelError::InvalidResponse {
                reason: "response carried no choices".into(),
            })?;

        let tool_calls = message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .filter_map(|call| {
                let function = call.function?;
                Some(ToolCallRequest {
                    name: function.name,
                    arguments: function.arguments,
                })
            })
            .collect();

        Ok(ModelResponse {
            content: message.content,
            tool_calls,
        })
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [FunctionSchema]>,
    stream: bool,
}

#[derive(Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
}

impl From<&ChatMessage> for WireMessage {
    fn from(message: &ChatMessage) -> Self {
        Self {
            role: message.role.as_str(),
            content: message.content.clone(),
        }
    }
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<WireChoice>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireResponseMessage,
}

#[derive(Deserialize)]
struct WireResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Deserialize)]
struct WireToolCall {
    #[serde(default)]
    function: Option<WireFunction>,
}

#[derive(Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}
