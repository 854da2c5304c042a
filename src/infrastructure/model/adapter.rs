//! Translation from discovered tool descriptors to the function-calling
//! schema the chat-completion API expects.

use crate::domain::types::ToolDescriptor;
use serde::Serialize;
use serde_json::{Map as JsonMap, Value, json};

/// One `tools` entry in a chat-completion request.
#[derive(Debug, Clone, Serialize)]
pub struct FunctionSchema {
    #[serde(rename = "type")]
    kind: &'static str,
    function: FunctionDef,
}

#[derive(Debug, Clone, Serialize)]
struct FunctionDef {
    name: String,
    description: String,
    parameters: Value,
}

impl FunctionSchema {
    pub fn name(&self) -> &str {
        &self.function.name
    }

    pub fn description(&self) -> &str {
        &self.function.description
    }

    pub fn parameters(&self) -> &Value {
        &self.function.parameters
    }
}

/// Pure structural copy: one function entry per descriptor. Each declared
/// parameter contributes its primitive type and its title as the
/// description; the required-name list is copied verbatim.
pub fn to_function_schemas(tools: &[ToolDescriptor]) -> Vec<FunctionSchema> {
    tools
        .iter()
        .map(|tool| {
            let mut properties = JsonMap::new();
            for param in &tool.input_schema.properties {
                properties.insert(
                    param.name.clone(),
                    json!({
                        "type": param.kind.as_str(),
                        "description": param.title,
                    }),
                );
            }
            FunctionSchema {
                kind: "function",
                function: FunctionDef {
                    name: tool.name.clone(),
                    description: tool.description.clone(),
                    parameters: json!({
                        "type": "object",
                        "properties": properties,
                        "required": tool.input_schema.required,
                    }),
                },
            }
        })
        .collect()
}
