//! Generic OpenAI-compatible server
//!
//! No catalog metadata: every caller option is forwarded except the reserved
//! keys, and response parsing tolerates the fields such servers often omit.

use async_trait::async_trait;
use domain::{
    BackendKind, CompletionRequest, Embedding, EmbeddingInput, ImageRequest, NormalizedResponse,
};
use reqwest::{Client, RequestBuilder};
use secrecy::ExposeSecret;
use serde_json::{Map, Value, json};
use tracing::{info, instrument};

use crate::{
    config::CompatibleConfig,
    error::InferenceError,
    http::send_json,
    normalize,
    payload::{build_compatible_payload, merge_whitelisted},
    ports::InferenceBackend,
};

const BACKEND: BackendKind = BackendKind::Compatible;

/// Adapter for OpenAI-compatible servers
#[derive(Debug)]
pub struct CompatibleBackend {
    client: Client,
    config: CompatibleConfig,
}

impl CompatibleBackend {
    /// Create an adapter sharing `client`
    pub fn new(client: Client, config: CompatibleConfig) -> Self {
        info!(
            endpoint = %config.endpoint,
            model = %config.model,
            "Initialized compatible backend"
        );
        Self { client, config }
    }

    fn post(&self, url: &str) -> RequestBuilder {
        let request = self.client.post(url);
        match &self.config.api_key {
            Some(key) => request.bearer_auth(key.expose_secret()),
            None => request,
        }
    }

    fn embedding_model(&self) -> &str {
        self.config
            .embedding_model
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(&self.config.model)
    }
}

#[async_trait]
impl InferenceBackend for CompatibleBackend {
    fn kind(&self) -> BackendKind {
        BACKEND
    }

    #[instrument(skip(self, request), fields(model = %self.config.model))]
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<NormalizedResponse, InferenceError> {
        let body = build_compatible_payload(&self.config.model, request);
        let value = send_json(BACKEND, self.post(&self.config.endpoint), &body, request.debug).await?;
        normalize::chat_completion(BACKEND, &value)
    }

    #[instrument(skip(self, input), fields(model = %self.embedding_model(), count = input.len()))]
    async fn embed(&self, input: &EmbeddingInput) -> Result<Embedding, InferenceError> {
        let url = self.config.resolved_embeddings_url().ok_or_else(|| {
            InferenceError::Configuration(format!(
                "cannot derive an embeddings URL from '{}'; set embeddings_url",
                self.config.endpoint
            ))
        })?;

        let body = json!({"model": self.embedding_model(), "input": input});
        let value = send_json(BACKEND, self.post(&url), &body, false).await?;
        let vectors = normalize::openai_embeddings(BACKEND, &value)?;
        normalize::embedding(BACKEND, input, vectors)
    }

    #[instrument(skip(self, request), fields(model = %self.config.model))]
    async fn generate_image(&self, request: &ImageRequest) -> Result<Value, InferenceError> {
        let url = self
            .config
            .images_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| InferenceError::unsupported(BACKEND, "image generation"))?;
        let prompt = request
            .prompt()
            .ok_or_else(|| InferenceError::MissingRequiredField("prompt".to_string()))?;

        let mut body = Map::new();
        body.insert("model".to_string(), json!(self.config.model));
        body.insert("prompt".to_string(), json!(prompt));
        let mut params = request.params.clone();
        params.remove("prompt");
        merge_whitelisted(&mut body, params, |_| true);

        send_json(BACKEND, self.post(url), &Value::Object(body), false).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::build_client;

    fn backend(config: CompatibleConfig) -> CompatibleBackend {
        CompatibleBackend::new(build_client().unwrap(), config)
    }

    #[tokio::test]
    async fn image_generation_without_url_is_unsupported() {
        let err = backend(CompatibleConfig {
            endpoint: "http://127.0.0.1:1/v1/chat/completions".to_string(),
            model: "m".to_string(),
            ..Default::default()
        })
        .generate_image(&ImageRequest::new("cat"))
        .await
        .unwrap_err();
        assert!(matches!(err, InferenceError::UnsupportedOperation { .. }));
    }

    #[tokio::test]
    async fn embeddings_without_derivable_url_is_configuration_error() {
        let err = backend(CompatibleConfig {
            endpoint: "http://127.0.0.1:1/generate".to_string(),
            model: "m".to_string(),
            ..Default::default()
        })
        .embed(&EmbeddingInput::from("x"))
        .await
        .unwrap_err();
        assert!(matches!(err, InferenceError::Configuration(_)));
    }

    #[test]
    fn embedding_model_falls_back_to_chat_model() {
        let backend = backend(CompatibleConfig {
            model: "qwen".to_string(),
            ..Default::default()
        });
        assert_eq!(backend.embedding_model(), "qwen");
    }
}
