//! Tool declarations and tool calls

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A function the model may call instead of (or alongside) answering in text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDeclaration {
    /// Function name
    pub name: String,
    /// What the function does, shown to the model
    #[serde(default)]
    pub description: String,
    /// JSON-schema-like description of the arguments
    #[serde(default = "empty_object_schema")]
    pub parameters: serde_json::Value,
}

fn empty_object_schema() -> serde_json::Value {
    serde_json::json!({"type": "object", "properties": {}})
}

impl ToolDeclaration {
    /// Create a declaration
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// A structured function invocation emitted by a model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Call identifier, provider-supplied or synthesized
    pub id: String,
    /// Function name
    pub name: String,
    /// Arguments as structured data
    pub arguments: serde_json::Value,
}

impl ToolCall {
    /// Create a tool call with a known identifier
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// Create a tool call for providers that do not assign call identifiers
    pub fn synthesized(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self::new(format!("call_{}", Uuid::new_v4().simple()), name, arguments)
    }

    /// Arguments as a JSON-encoded string, the shape OpenAI-style APIs expect
    #[must_use]
    pub fn arguments_json(&self) -> String {
        self.arguments.to_string()
    }

    /// Parse arguments delivered as a JSON-encoded string
    ///
    /// Providers occasionally send arguments that are not valid JSON; those are
    /// kept verbatim as a JSON string rather than dropped.
    #[must_use]
    pub fn parse_arguments(raw: &str) -> serde_json::Value {
        if raw.trim().is_empty() {
            return serde_json::json!({});
        }
        serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
    }
}

/// How the model should choose between tools
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoice {
    /// Model decides
    #[default]
    Auto,
    /// Never call a tool
    None,
    /// Must call some tool
    Required,
    /// Must call the named function
    Function(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthesized_ids_are_unique_and_prefixed() {
        let a = ToolCall::synthesized("f", serde_json::json!({}));
        let b = ToolCall::synthesized("f", serde_json::json!({}));
        assert!(a.id.starts_with("call_"));
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn arguments_json_encodes_object() {
        let call = ToolCall::new("1", "weather", serde_json::json!({"city": "Paris"}));
        assert_eq!(call.arguments_json(), r#"{"city":"Paris"}"#);
    }

    #[test]
    fn parse_arguments_accepts_json_string() {
        let value = ToolCall::parse_arguments(r#"{"n": 3}"#);
        assert_eq!(value["n"], 3);
    }

    #[test]
    fn parse_arguments_keeps_invalid_json_verbatim() {
        let value = ToolCall::parse_arguments("{not json");
        assert_eq!(value, serde_json::Value::String("{not json".to_string()));
    }

    #[test]
    fn parse_arguments_treats_empty_as_empty_object() {
        assert_eq!(ToolCall::parse_arguments("  "), serde_json::json!({}));
    }

    #[test]
    fn declaration_defaults_parameters() {
        let decl: ToolDeclaration = serde_json::from_str(r#"{"name": "ping"}"#).unwrap();
        assert_eq!(decl.parameters["type"], "object");
        assert!(decl.description.is_empty());
    }
}
