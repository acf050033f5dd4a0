//! Normalized response returned by every backend

use serde::{Deserialize, Serialize};

use super::tool::ToolCall;

/// Backend-independent result of a completion call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum NormalizedResponse {
    /// Plain text answer
    Text {
        /// Generated text
        text: String,
    },
    /// A single function call and nothing else
    ToolCall {
        /// The requested call
        call: ToolCall,
    },
    /// Text together with one or more function calls, or several calls
    MixedContent {
        /// Generated text, possibly empty
        text: String,
        /// Requested calls, in the order the provider emitted them
        tool_calls: Vec<ToolCall>,
    },
}

impl NormalizedResponse {
    /// Plain text response
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Collapse a text part and a list of tool calls into the matching variant
    ///
    /// No tool calls yields `Text`; exactly one call without text yields
    /// `ToolCall`; anything else is `MixedContent`.
    #[must_use]
    pub fn from_parts(text: String, mut tool_calls: Vec<ToolCall>) -> Self {
        if tool_calls.is_empty() {
            return Self::Text { text };
        }
        if tool_calls.len() == 1 && text.trim().is_empty() {
            if let Some(call) = tool_calls.pop() {
                return Self::ToolCall { call };
            }
        }
        Self::MixedContent { text, tool_calls }
    }

    /// Text part of the response (empty for a bare tool call)
    #[must_use]
    pub fn as_text(&self) -> &str {
        match self {
            Self::Text { text } | Self::MixedContent { text, .. } => text,
            Self::ToolCall { .. } => "",
        }
    }

    /// All tool calls carried by the response
    #[must_use]
    pub fn tool_calls(&self) -> Vec<&ToolCall> {
        match self {
            Self::Text { .. } => Vec::new(),
            Self::ToolCall { call } => vec![call],
            Self::MixedContent { tool_calls, .. } => tool_calls.iter().collect(),
        }
    }

    /// Whether the model asked for at least one tool call
    #[must_use]
    pub const fn has_tool_calls(&self) -> bool {
        !matches!(self, Self::Text { .. })
    }
}
