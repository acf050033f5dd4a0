//! Model capability record loaded from the catalog

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::value_objects::ModelCategory;

/// Operation a model endpoint serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointKind {
    /// Chat completions (`messages` array)
    Chat,
    /// Structured responses (`input` content parts)
    Responses,
    /// Embeddings
    Embeddings,
    /// Image generation
    Images,
}

/// Validation schema of a single image-generation field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ParameterSchema {
    /// Value must be one of `values`
    Enum {
        /// Allowed values
        values: Vec<serde_json::Value>,
        /// Value used when the caller omits the field
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default: Option<serde_json::Value>,
    },
    /// Whole number within optional bounds
    Integer {
        /// Inclusive lower bound
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<i64>,
        /// Inclusive upper bound
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<i64>,
        /// Value used when the caller omits the field
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default: Option<i64>,
    },
    /// Real number within optional bounds
    Number {
        /// Inclusive lower bound
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        /// Inclusive upper bound
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
    },
    /// Free-form string
    String,
}

/// Immutable capability record of one model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Catalog identifier
    pub id: String,
    /// Capability class
    pub category: ModelCategory,
    /// Request parameters the model accepts; everything else is dropped
    #[serde(default)]
    pub supported_params: BTreeSet<String>,
    /// Context window in tokens
    #[serde(default)]
    pub max_context_tokens: u32,
    /// Output token ceiling
    pub max_output_tokens: u32,
    /// Whether requests must carry a reasoning block
    #[serde(default)]
    pub reasoning_required: bool,
    /// Endpoint path per operation
    #[serde(default)]
    pub endpoints: BTreeMap<EndpointKind, String>,
    /// Human-readable description
    #[serde(default)]
    pub description: String,
    /// Per-field validation schema for image generation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_parameters: Option<BTreeMap<String, ParameterSchema>>,
}

impl ModelMetadata {
    /// Whether `param` is in the supported parameter whitelist
    #[must_use]
    pub fn supports(&self, param: &str) -> bool {
        self.supported_params.contains(param)
    }

    /// Endpoint path for an operation
    #[must_use]
    pub fn endpoint(&self, kind: EndpointKind) -> Option<&str> {
        self.endpoints.get(&kind).map(String::as_str)
    }

    /// Whether requests should use the structured-response endpoint
    ///
    /// True when the model exposes one and chat is not its primary mode.
    #[must_use]
    pub fn prefers_responses(&self) -> bool {
        self.endpoints.contains_key(&EndpointKind::Responses) && !self.category.is_chat_primary()
    }

    /// Whether the model reasons before answering
    #[must_use]
    pub fn is_reasoning(&self) -> bool {
        self.reasoning_required || self.category == ModelCategory::Reasoning
    }

    /// Clamp a requested output budget to `[1, max_output_tokens]`
    #[must_use]
    pub fn clamp_output_tokens(&self, requested: u32) -> u32 {
        requested.clamp(1, self.max_output_tokens.max(1))
    }
}
