//! Model category value object

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Broad capability class of a model
///
/// The category decides which payload builder and endpoint a request uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelCategory {
    /// Conversational model served primarily through chat completions
    Chat,
    /// Model with an internal reasoning phase
    Reasoning,
    /// Text embedding model
    Embedding,
    /// Image generation model
    Image,
    /// Speech / audio model
    Audio,
    /// Anything else; plain text completion
    Completion,
}

impl ModelCategory {
    /// Lowercase name as used in the catalog
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Reasoning => "reasoning",
            Self::Embedding => "embedding",
            Self::Image => "image",
            Self::Audio => "audio",
            Self::Completion => "completion",
        }
    }

    /// Whether requests for this category go through chat completions first
    #[must_use]
    pub const fn is_chat_primary(&self) -> bool {
        matches!(self, Self::Chat)
    }
}

impl fmt::Display for ModelCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ModelCategory {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "chat" => Ok(Self::Chat),
            "reasoning" => Ok(Self::Reasoning),
            "embedding" => Ok(Self::Embedding),
            "image" => Ok(Self::Image),
            "audio" => Ok(Self::Audio),
            "completion" => Ok(Self::Completion),
            _ => Err(DomainError::UnknownCategory(s.to_string())),
        }
    }
}
