//! Image generation request

use serde::{Deserialize, Serialize};

/// Request for image generation
///
/// Parameters are model specific and validated against the model's
/// declared schema before anything is sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageRequest {
    /// Text prompt
    #[serde(default)]
    pub prompt: Option<String>,
    /// Model-specific parameters (size, quality, n, ...)
    #[serde(flatten)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

impl ImageRequest {
    /// Create a request with a prompt
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: Some(prompt.into()),
            params: serde_json::Map::new(),
        }
    }

    /// Add a model-specific parameter
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    /// Prompt, if present and not blank
    #[must_use]
    pub fn prompt(&self) -> Option<&str> {
        self.prompt.as_deref().filter(|p| !p.trim().is_empty())
    }
}
