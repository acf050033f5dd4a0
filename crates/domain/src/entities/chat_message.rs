//! Chat message entity

use serde::{Deserialize, Serialize};

use super::tool::ToolCall;

/// Role of the message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Message from the user
    User,
    /// Message from the assistant
    Assistant,
    /// System prompt or instruction
    System,
}

impl MessageRole {
    /// Lowercase role name as sent on the wire
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

/// Body of a chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageContent {
    /// Plain text
    Text(String),
    /// Function calls previously emitted by the assistant
    ToolCalls(Vec<ToolCall>),
    /// Result of running a tool, fed back to the model
    ToolResult {
        /// Identifier of the call this result answers
        call_id: String,
        /// Name of the function that produced the result
        name: String,
        /// Serialized result
        content: String,
    },
}

/// A single turn of chat history
///
/// History is read-only input: the dispatcher never appends to it. Callers
/// add the reply to their own copy after receiving it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the sender
    pub role: MessageRole,
    /// Message body
    pub content: MessageContent,
}

impl ChatMessage {
    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: MessageContent::Text(content.into()),
        }
    }

    /// Create a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: MessageContent::Text(content.into()),
        }
    }

    /// Create a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: MessageContent::Text(content.into()),
        }
    }

    /// Assistant turn that requested tool calls
    pub fn assistant_tool_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: MessageContent::ToolCalls(calls),
        }
    }

    /// User-side turn carrying the result of a tool call
    pub fn tool_result(
        call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            role: MessageRole::User,
            content: MessageContent::ToolResult {
                call_id: call_id.into(),
                name: name.into(),
                content: content.into(),
            },
        }
    }

    /// Text body, if this is a plain text message
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            MessageContent::Text(text) => Some(text),
            _ => None,
        }
    }
}
