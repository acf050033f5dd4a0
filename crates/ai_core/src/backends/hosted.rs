//! Hosted, metadata-driven provider (OpenAI API)
//!
//! Request shape, endpoint and accepted parameters all come from the model
//! registry. Models missing from the catalog are rejected rather than sent
//! with a guessed payload.

use std::sync::Arc;

use async_trait::async_trait;
use domain::{
    BackendKind, CompletionRequest, Embedding, EmbeddingInput, EndpointKind, ImageRequest,
    ModelMetadata, NormalizedResponse,
};
use reqwest::{Client, RequestBuilder};
use secrecy::ExposeSecret;
use serde_json::json;
use tracing::{debug, info, instrument};

use crate::{
    config::HostedConfig,
    error::InferenceError,
    http::{join_url, send_json},
    normalize,
    payload::{build_chat_payload, build_image_payload, build_responses_payload},
    ports::InferenceBackend,
    registry::ModelRegistry,
};

const BACKEND: BackendKind = BackendKind::Hosted;

/// Adapter for the hosted provider
#[derive(Debug)]
pub struct HostedBackend {
    client: Client,
    config: HostedConfig,
    registry: Arc<ModelRegistry>,
}

impl HostedBackend {
    /// Create an adapter sharing `client` and `registry`
    pub fn new(client: Client, config: HostedConfig, registry: Arc<ModelRegistry>) -> Self {
        info!(
            base_url = %config.base_url,
            model = %config.model,
            "Initialized hosted backend"
        );
        Self {
            client,
            config,
            registry,
        }
    }

    fn post(&self, path: &str) -> RequestBuilder {
        let mut request = self.client.post(join_url(&self.config.base_url, path));
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key.expose_secret());
        }
        if let Some(organization) = &self.config.organization {
            request = request.header("OpenAI-Organization", organization);
        }
        request
    }

    fn metadata(&self, model: &str) -> Result<Arc<ModelMetadata>, InferenceError> {
        self.registry
            .get_meta(model)?
            .ok_or_else(|| InferenceError::UnknownModel(model.to_string()))
    }
}

#[async_trait]
impl InferenceBackend for HostedBackend {
    fn kind(&self) -> BackendKind {
        BACKEND
    }

    #[instrument(skip(self, request), fields(model = %self.config.model))]
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<NormalizedResponse, InferenceError> {
        let model = self.config.model.as_str();
        let meta = self.metadata(model)?;

        let chat = meta.endpoint(EndpointKind::Chat);
        let responses = meta.endpoint(EndpointKind::Responses);

        if let Some(path) = responses.filter(|_| meta.prefers_responses() || chat.is_none()) {
            debug!(endpoint = %path, "Using structured-response endpoint");
            let body = build_responses_payload(model, &meta, request);
            let value = send_json(BACKEND, self.post(path), &body, request.debug).await?;
            return normalize::responses(BACKEND, &value);
        }

        let path = chat.ok_or_else(|| {
            InferenceError::UnknownModel(format!("{model} (no usable endpoint)"))
        })?;
        debug!(endpoint = %path, "Using chat endpoint");
        let body = build_chat_payload(model, &meta, request);
        let value = send_json(BACKEND, self.post(path), &body, request.debug).await?;
        normalize::chat_completion(BACKEND, &value)
    }

    #[instrument(skip(self, input), fields(model = %self.config.embedding_model, count = input.len()))]
    async fn embed(&self, input: &EmbeddingInput) -> Result<Embedding, InferenceError> {
        let model = self.config.embedding_model.as_str();
        let meta = self.metadata(model)?;
        let path = meta.endpoint(EndpointKind::Embeddings).ok_or_else(|| {
            InferenceError::UnknownModel(format!("{model} (no embeddings endpoint)"))
        })?;

        let body = json!({"model": model, "input": input});
        let value = send_json(BACKEND, self.post(path), &body, false).await?;
        let vectors = normalize::openai_embeddings(BACKEND, &value)?;
        normalize::embedding(BACKEND, input, vectors)
    }

    #[instrument(skip(self, request), fields(model = %self.config.image_model))]
    async fn generate_image(
        &self,
        request: &ImageRequest,
    ) -> Result<serde_json::Value, InferenceError> {
        let model = self.config.image_model.as_str();
        let meta = self.metadata(model)?;
        let path = meta.endpoint(EndpointKind::Images).ok_or_else(|| {
            InferenceError::UnknownModel(format!("{model} (no images endpoint)"))
        })?;

        let body = build_image_payload(model, &meta, request)?;
        send_json(BACKEND, self.post(path), &body, false).await
    }
}
