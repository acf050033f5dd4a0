//! Port definitions
//!
//! Defines the traits (ports) that backend adapters and credential
//! infrastructure must implement.

use async_trait::async_trait;
use domain::{
    BackendKind, CompletionRequest, Embedding, EmbeddingInput, ImageRequest, NormalizedResponse,
};
#[cfg(test)]
use mockall::automock;

use crate::{
    config::OAuthClientConfig,
    credentials::{CredentialLock, OAuthCredential, TokenGrant},
    error::InferenceError,
};

/// Uniform interface over every inference backend
#[cfg_attr(test, automock)]
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Backend this adapter talks to
    fn kind(&self) -> BackendKind;

    /// Run a completion and normalize the reply
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<NormalizedResponse, InferenceError>;

    /// Embed one text or a batch, preserving cardinality and order
    async fn embed(&self, input: &EmbeddingInput) -> Result<Embedding, InferenceError>;

    /// Generate images, returning the provider JSON as-is
    ///
    /// Backends without image generation keep the default.
    async fn generate_image(
        &self,
        request: &ImageRequest,
    ) -> Result<serde_json::Value, InferenceError> {
        let _ = request;
        Err(InferenceError::unsupported(self.kind(), "image generation"))
    }
}

/// Persistent storage of OAuth credentials
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Load the credential stored under `key`
    async fn load(&self, key: &str) -> Result<Option<OAuthCredential>, InferenceError>;

    /// Persist a credential under `key`, replacing any previous value
    async fn save(&self, key: &str, credential: &OAuthCredential) -> Result<(), InferenceError>;

    /// Tell other workers sharing this store that `key` was refreshed
    async fn notify_refreshed(&self, key: &str) -> Result<(), InferenceError>;

    /// Exclusive hold on `key` across every worker sharing this store
    ///
    /// The credential manager keeps the returned lock from the reload
    /// through refresh, save and notify; it is released on drop.
    async fn lock(&self, key: &str) -> Result<CredentialLock, InferenceError>;
}

/// Exchanges a refresh token for a new access token
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// Perform the refresh grant against the client's token endpoint
    async fn refresh(
        &self,
        client: &OAuthClientConfig,
        refresh_token: &str,
    ) -> Result<TokenGrant, InferenceError>;
}
