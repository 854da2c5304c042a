use crate::domain::types::ToolDescriptor;
use futures::future::BoxFuture;
use serde_json::Value;
use std::future::Future;
use thiserror::Error;
use tracing::debug;

pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;
pub type HandlerResult = Result<String, HandlerError>;
type ToolHandler = Box<dyn Fn(Value) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("unknown tool requested: {0}")]
    UnknownTool(String),
    #[error("tool '{tool}' failed: {source}")]
    Execution {
        tool: String,
        #[source]
        source: HandlerError,
    },
}

/// The server side's catalogue: an ordered mapping from tool name to its
/// declared schema and the async callable that executes it.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
}

struct RegisteredTool {
    descriptor: ToolDescriptor,
    handler: ToolHandler,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Register a tool. Names are expected to be unique; a duplicate
    /// replaces the earlier registration in place.
    pub fn register<F, Fut>(&mut self, descriptor: ToolDescriptor, handler: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let handler: ToolHandler = Box::new(move |args| Box::pin(handler(args)));
        if let Some(existing) = self
            .tools
            .iter_mut()
            .find(|tool| tool.descriptor.name == descriptor.name)
        {
            existing.descriptor = descriptor;
            existing.handler = handler;
        } else {
            self.tools.push(RegisteredTool {
                descriptor,
                handler,
            });
        }
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.tools.iter().map(|tool| &tool.descriptor)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub async fn dispatch(&self, name: &str, args: Value) -> Result<String, RegistryError> {
        let tool = self
            .tools
            .iter()
            .find(|tool| tool.descriptor.name == name)
            .ok_or_else(|| RegistryError::UnknownTool(name.to_string()))?;
        debug!(tool = name, "Dispatching tool invocation");
        (tool.handler)(args)
            .await
            .map_err(|source| RegistryError::Execution {
                tool: name.to_string(),
                source,
            })
    }
}
