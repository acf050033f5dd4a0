//! Inference dispatcher
//!
//! Resolves the effective backend configuration for a call, builds the
//! matching adapter and runs the operation under the call's deadline and
//! cancellation token. Adapters are cheap to build: they share one HTTP
//! client, one model registry and one credential manager.

use std::{sync::Arc, time::Duration};

use domain::{
    BackendKind, CompletionRequest, Embedding, EmbeddingInput, ExecutionContext, ImageRequest,
    NormalizedResponse,
};
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::{
    backends::{CompatibleBackend, HostedBackend, LlamaCppBackend, OllamaBackend, VertexBackend},
    cancel::{CallOptions, run_with_deadline},
    config::{BackendConfig, ConfigOverrides, DispatchConfig, DispatcherConfig},
    credentials::CredentialManager,
    error::InferenceError,
    http::build_client,
    ports::InferenceBackend,
    registry::ModelRegistry,
};

/// Options of a completion call
#[derive(Debug, Clone, Default)]
pub struct CompletionOptions {
    /// What to complete
    pub request: CompletionRequest,
    /// Call-time configuration overrides
    pub overrides: ConfigOverrides,
    /// Deadline, cancellation and caller context
    pub call: CallOptions,
}

impl CompletionOptions {
    /// Options for `request` with no overrides
    pub fn new(request: CompletionRequest) -> Self {
        Self {
            request,
            ..Default::default()
        }
    }

    /// Set the configuration overrides
    #[must_use]
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Set the call options
    #[must_use]
    pub fn with_call(mut self, call: CallOptions) -> Self {
        self.call = call;
        self
    }
}

/// Options of an embedding call
#[derive(Debug, Clone)]
pub struct EmbeddingOptions {
    /// Text or texts to embed
    pub input: EmbeddingInput,
    /// Call-time configuration overrides
    pub overrides: ConfigOverrides,
    /// Deadline, cancellation and caller context
    pub call: CallOptions,
}

impl EmbeddingOptions {
    /// Options for `input` with no overrides
    pub fn new(input: impl Into<EmbeddingInput>) -> Self {
        Self {
            input: input.into(),
            overrides: ConfigOverrides::default(),
            call: CallOptions::default(),
        }
    }

    /// Set the configuration overrides
    #[must_use]
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Set the call options
    #[must_use]
    pub fn with_call(mut self, call: CallOptions) -> Self {
        self.call = call;
        self
    }
}

/// Options of an image generation call
#[derive(Debug, Clone, Default)]
pub struct ImageOptions {
    /// Prompt and provider parameters
    pub request: ImageRequest,
    /// Call-time configuration overrides
    pub overrides: ConfigOverrides,
    /// Deadline, cancellation and caller context
    pub call: CallOptions,
}

impl ImageOptions {
    /// Options for `request` with no overrides
    pub fn new(request: ImageRequest) -> Self {
        Self {
            request,
            ..Default::default()
        }
    }

    /// Set the configuration overrides
    #[must_use]
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Set the call options
    #[must_use]
    pub fn with_call(mut self, call: CallOptions) -> Self {
        self.call = call;
        self
    }
}

/// Entry point for every inference call
#[derive(Debug, Clone)]
pub struct Dispatcher {
    client: Client,
    registry: Arc<ModelRegistry>,
    credentials: Option<Arc<CredentialManager>>,
    config: DispatcherConfig,
}

impl Dispatcher {
    /// Dispatcher with its own HTTP client, reading the catalog named in
    /// `config` or the embedded one
    pub fn new(config: DispatcherConfig) -> Result<Self, InferenceError> {
        let registry = config
            .catalog_path
            .as_ref()
            .map_or_else(ModelRegistry::embedded, ModelRegistry::from_path);
        Ok(Self::with_parts(build_client()?, Arc::new(registry), config))
    }

    /// Dispatcher over an existing client and registry
    pub const fn with_parts(
        client: Client,
        registry: Arc<ModelRegistry>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            client,
            registry,
            credentials: None,
            config,
        }
    }

    /// Attach the credential manager used by OAuth-authenticated backends
    #[must_use]
    pub fn with_credentials(mut self, credentials: Arc<CredentialManager>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Model registry backing metadata-driven adapters
    pub const fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    /// Build the adapter for one resolved configuration
    pub fn backend_for(
        &self,
        config: &BackendConfig,
        context: &ExecutionContext,
    ) -> Result<Box<dyn InferenceBackend>, InferenceError> {
        let backend: Box<dyn InferenceBackend> = match config {
            BackendConfig::Hosted(c) => Box::new(HostedBackend::new(
                self.client.clone(),
                c.clone(),
                Arc::clone(&self.registry),
            )),
            BackendConfig::Compatible(c) => {
                Box::new(CompatibleBackend::new(self.client.clone(), c.clone()))
            },
            BackendConfig::LocalDaemon(c) => {
                Box::new(OllamaBackend::new(self.client.clone(), c.clone()))
            },
            BackendConfig::LocalSubprocess(c) => {
                Box::new(LlamaCppBackend::new(c.clone(), context.clone()))
            },
            BackendConfig::CloudMultimodal(c) => {
                let credentials = self.credentials.as_ref().ok_or_else(|| {
                    InferenceError::Configuration(
                        "cloud_multimodal backend requires a credential manager".to_string(),
                    )
                })?;
                Box::new(VertexBackend::new(
                    self.client.clone(),
                    c.clone(),
                    Arc::clone(credentials),
                ))
            },
        };
        Ok(backend)
    }

    fn timeout(&self, call: &CallOptions) -> Duration {
        call.timeout
            .unwrap_or_else(|| Duration::from_millis(self.config.default_timeout_ms))
    }

    /// Run a completion on the configured backend
    #[instrument(skip_all, fields(backend = %config.backend.kind()))]
    pub async fn complete(
        &self,
        config: &DispatchConfig,
        options: CompletionOptions,
    ) -> Result<NormalizedResponse, InferenceError> {
        let resolved = config.resolve(&options.overrides)?;
        debug!(model = %resolved.model(), context = %options.call.context.describe(), "Dispatching completion");
        let backend = self.backend_for(&resolved, &options.call.context)?;
        run_with_deadline(
            backend.complete(&options.request),
            self.timeout(&options.call),
            options.call.cancel.as_ref(),
        )
        .await
    }

    /// Embed one text or a batch on the configured backend
    ///
    /// Backends without embeddings fail with
    /// [`InferenceError::UnsupportedOperation`] before the backend is built.
    #[instrument(skip_all, fields(backend = %config.backend.kind(), count = options.input.len()))]
    pub async fn embed(
        &self,
        config: &DispatchConfig,
        options: EmbeddingOptions,
    ) -> Result<Embedding, InferenceError> {
        let resolved = config.resolve(&options.overrides)?;
        let kind = resolved.kind();
        if !kind.supports_embeddings() {
            return Err(InferenceError::unsupported(kind, "embeddings"));
        }
        debug!(model = %resolved.model(), "Dispatching embedding");
        let backend = self.backend_for(&resolved, &options.call.context)?;
        run_with_deadline(
            backend.embed(&options.input),
            self.timeout(&options.call),
            options.call.cancel.as_ref(),
        )
        .await
    }

    /// Generate images on the configured backend
    ///
    /// Backends without image generation fail with
    /// [`InferenceError::UnsupportedOperation`] before any request is made.
    #[instrument(skip_all, fields(backend = %config.backend.kind()))]
    pub async fn generate_image(
        &self,
        config: &DispatchConfig,
        options: ImageOptions,
    ) -> Result<Value, InferenceError> {
        let resolved = config.resolve(&options.overrides)?;
        let kind: BackendKind = resolved.kind();
        if !kind.supports_images() {
            return Err(InferenceError::unsupported(kind, "image generation"));
        }
        debug!(model = %resolved.model(), "Dispatching image generation");
        let backend = self.backend_for(&resolved, &options.call.context)?;
        run_with_deadline(
            backend.generate_image(&options.request),
            self.timeout(&options.call),
            options.call.cancel.as_ref(),
        )
        .await
    }
}
