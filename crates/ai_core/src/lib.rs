//! AI Core - Model registry and multi-backend inference dispatch
//!
//! A single [`Dispatcher`] serves completions, embeddings and image
//! generation across five backends: a hosted provider whose request shapes
//! come from the model catalog, any OpenAI-compatible server, a local
//! Ollama daemon, a local llama.cpp subprocess, and Vertex AI Gemini with
//! OAuth credential refresh. Every reply is normalized into the domain's
//! [`domain::NormalizedResponse`] or [`domain::Embedding`].

pub mod backends;
pub mod cancel;
pub mod config;
pub mod credentials;
pub mod dispatcher;
pub mod error;
pub mod http;
pub mod normalize;
pub mod payload;
pub mod ports;
pub mod registry;

pub use cancel::CallOptions;
pub use config::{
    BackendConfig, CloudConfig, CompatibleConfig, ConfigOverrides, DispatchConfig,
    DispatcherConfig, HostedConfig, LocalDaemonConfig, OAuthClientConfig, SubprocessConfig,
};
pub use credentials::{
    CredentialLock, CredentialManager, CredentialState, MemoryCredentialStore, OAuthCredential,
    OAuthTokenRefresher, TokenGrant,
};
pub use dispatcher::{CompletionOptions, Dispatcher, EmbeddingOptions, ImageOptions};
pub use error::InferenceError;
pub use ports::{CredentialStore, InferenceBackend, TokenRefresher};
pub use registry::{CatalogSource, ModelRegistry};
