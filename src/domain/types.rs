use serde_json::{Map as JsonMap, Value, json};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    User,
    Assistant,
    Tool,
}

impl MessageRole {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::Tool => "tool",
        }
    }
}

/// One entry of the conversation passed to the model on every completion
/// request. The sequence is rebuilt per turn and is append-only within it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// The closed set of parameter kinds a tool schema may declare. Anything
/// outside this set is rejected at catalogue-parse time instead of being
/// passed through untyped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Boolean,
    Number,
}

impl ParamKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ParamKind::String => "string",
            ParamKind::Boolean => "boolean",
            ParamKind::Number => "number",
        }
    }

    pub fn parse(value: &str) -> Result<Self, SchemaViolation> {
        match value {
            "string" => Ok(ParamKind::String),
            "boolean" => Ok(ParamKind::Boolean),
            "number" => Ok(ParamKind::Number),
            other => Err(SchemaViolation::UnsupportedKind(other.to_string())),
        }
    }
}

/// A single named parameter of a tool. `title` is the human-readable label
/// the schema adapter forwards to the model as the parameter description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterSpec {
    pub name: String,
    pub kind: ParamKind,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ToolInputSchema {
    pub properties: Vec<ParameterSpec>,
    pub required: Vec<String>,
}

/// A tool as discovered from the server. Immutable once listed; owned by
/// the session's catalogue until teardown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: ToolInputSchema,
}

/// Successful payload of a tool invocation. Consumed immediately into a
/// conversation message; never retained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub content: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaViolation {
    #[error("descriptor is missing field '{0}'")]
    MissingField(&'static str),
    #[error("unsupported parameter kind '{0}'")]
    UnsupportedKind(String),
    #[error("unsupported schema type '{0}' (expected 'object')")]
    UnsupportedSchemaType(String),
    #[error("parameter '{0}' is not an object")]
    MalformedParameter(String),
}

impl ToolDescriptor {
    /// Serialize to the wire shape carried by `tools/list`.
    pub fn to_wire(&self) -> Value {
        let mut properties = JsonMap::new();
        for param in &self.input_schema.properties {
            properties.insert(
                param.name.clone(),
                json!({
                    "type": param.kind.as_str(),
                    "title": param.title,
                }),
            );
        }
        json!({
            "name": self.name,
            "description": self.description,
            "inputSchema": {
                "type": "object",
                "properties": properties,
                "required": self.input_schema.required,
            },
        })
    }

    /// Parse a `tools/list` entry, failing fast on unrecognized parameter
    /// kinds or a non-object schema.
    pub fn from_wire(value: &Value) -> Result<Self, SchemaViolation> {
        let name = value
            .get("name")
            .and_then(Value::as_str)
            .ok_or(SchemaViolation::MissingField("name"))?
            .to_string();
        let description = value
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let schema = value
            .get("inputSchema")
            .ok_or(SchemaViolation::MissingField("inputSchema"))?;

        if let Some(kind) = schema.get("type").and_then(Value::as_str) {
            if kind != "object" {
                return Err(SchemaViolation::UnsupportedSchemaType(kind.to_string()));
            }
        }

        let mut properties = Vec::new();
        if let Some(entries) = schema.get("properties").and_then(Value::as_object) {
            for (param_name, spec) in entries {
                let spec = spec
                    .as_object()
                    .ok_or_else(|| SchemaViolation::MalformedParameter(param_name.clone()))?;
                let kind = spec
                    .get("type")
                    .and_then(Value::as_str)
                    .ok_or(SchemaViolation::MissingField("type"))?;
                let title = spec
                    .get("title")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                properties.push(ParameterSpec {
                    name: param_name.clone(),
                    kind: ParamKind::parse(kind)?,
                    title,
                });
            }
        }

        let required = schema
            .get("required")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            name,
            description,
            input_schema: ToolInputSchema {
                properties,
                required,
            },
        })
    }
}
