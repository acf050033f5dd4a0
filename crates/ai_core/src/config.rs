//! Backend configuration
//!
//! One config struct per backend, joined in the closed [`BackendConfig`]
//! union tagged by `backend`. A [`DispatchConfig`] adds named alternates that
//! a caller can select per call through [`ConfigOverrides::profile`].

use std::{collections::BTreeMap, path::PathBuf};

use domain::BackendKind;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::error::InferenceError;

/// Default per-call deadline applied by the dispatcher
pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;

/// Hosted, metadata-driven provider (OpenAI API)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostedConfig {
    /// API base URL without the `/v1/...` path
    #[serde(default = "default_hosted_base_url")]
    pub base_url: String,

    /// Bearer API key
    #[serde(default, skip_serializing)]
    pub api_key: Option<SecretString>,

    /// Optional organization id sent as `OpenAI-Organization`
    #[serde(default)]
    pub organization: Option<String>,

    /// Model used for completions
    #[serde(default = "default_hosted_model")]
    pub model: String,

    /// Model used for embeddings
    #[serde(default = "default_hosted_embedding_model")]
    pub embedding_model: String,

    /// Model used for image generation
    #[serde(default = "default_hosted_image_model")]
    pub image_model: String,
}

fn default_hosted_base_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_hosted_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_hosted_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_hosted_image_model() -> String {
    "dall-e-3".to_string()
}

impl Default for HostedConfig {
    fn default() -> Self {
        Self {
            base_url: default_hosted_base_url(),
            api_key: None,
            organization: None,
            model: default_hosted_model(),
            embedding_model: default_hosted_embedding_model(),
            image_model: default_hosted_image_model(),
        }
    }
}

/// Any OpenAI-compatible server
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompatibleConfig {
    /// Full chat endpoint URL, e.g. `http://host/v1/chat/completions`
    #[serde(default)]
    pub endpoint: String,

    /// Bearer API key, omitted from requests when unset
    #[serde(default, skip_serializing)]
    pub api_key: Option<SecretString>,

    /// Model name sent in every request
    #[serde(default)]
    pub model: String,

    /// Embedding model, defaults to `model`
    #[serde(default)]
    pub embedding_model: Option<String>,

    /// Full embeddings URL, derived from `endpoint` when unset
    #[serde(default)]
    pub embeddings_url: Option<String>,

    /// Full image generation URL; image generation is unavailable without it
    #[serde(default)]
    pub images_url: Option<String>,
}

impl CompatibleConfig {
    /// Embeddings URL: configured, or the chat URL with its trailing
    /// `/chat/completions` replaced by `/embeddings`
    pub fn resolved_embeddings_url(&self) -> Option<String> {
        if let Some(url) = self.embeddings_url.as_deref().filter(|u| !u.trim().is_empty()) {
            return Some(url.to_string());
        }
        let endpoint = self.endpoint.trim_end_matches('/');
        endpoint
            .strip_suffix("/chat/completions")
            .map(|base| format!("{base}/embeddings"))
    }
}

/// Local long-running daemon (Ollama)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalDaemonConfig {
    /// Daemon base URL
    #[serde(default = "default_daemon_base_url")]
    pub base_url: String,

    /// Chat model
    #[serde(default = "default_daemon_model")]
    pub model: String,

    /// Embedding model
    #[serde(default = "default_daemon_embedding_model")]
    pub embedding_model: String,
}

fn default_daemon_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_daemon_model() -> String {
    "llama3.2".to_string()
}

fn default_daemon_embedding_model() -> String {
    "nomic-embed-text".to_string()
}

impl Default for LocalDaemonConfig {
    fn default() -> Self {
        Self {
            base_url: default_daemon_base_url(),
            model: default_daemon_model(),
            embedding_model: default_daemon_embedding_model(),
        }
    }
}

/// Local command-line runner (llama.cpp `llama-cli`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubprocessConfig {
    /// Directory containing the executable
    #[serde(default = "default_executable_dir")]
    pub executable_dir: PathBuf,

    /// Executable file name
    #[serde(default = "default_executable")]
    pub executable: String,

    /// Path of the GGUF model file passed with `-m`
    #[serde(default)]
    pub model_path: PathBuf,

    /// Token budget when the request carries none
    #[serde(default = "default_subprocess_max_tokens")]
    pub default_max_tokens: u32,

    /// Number of CPU threads (`-t`)
    #[serde(default)]
    pub threads: Option<u32>,

    /// Context size (`-c`)
    #[serde(default)]
    pub context_size: Option<u32>,
}

fn default_executable_dir() -> PathBuf {
    PathBuf::from("/usr/local/bin")
}

fn default_executable() -> String {
    "llama-cli".to_string()
}

const fn default_subprocess_max_tokens() -> u32 {
    256
}

impl Default for SubprocessConfig {
    fn default() -> Self {
        Self {
            executable_dir: default_executable_dir(),
            executable: default_executable(),
            model_path: PathBuf::new(),
            default_max_tokens: default_subprocess_max_tokens(),
            threads: None,
            context_size: None,
        }
    }
}

impl SubprocessConfig {
    /// Full path of the executable
    pub fn executable_path(&self) -> PathBuf {
        self.executable_dir.join(&self.executable)
    }
}

/// OAuth client used to refresh cloud credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthClientConfig {
    /// Token endpoint
    #[serde(default = "default_token_url")]
    pub token_url: String,

    /// OAuth client id
    #[serde(default)]
    pub client_id: String,

    /// OAuth client secret
    #[serde(default, skip_serializing)]
    pub client_secret: Option<SecretString>,
}

fn default_token_url() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

impl Default for OAuthClientConfig {
    fn default() -> Self {
        Self {
            token_url: default_token_url(),
            client_id: String::new(),
            client_secret: None,
        }
    }
}

/// Cloud multi-modal provider (Vertex AI Gemini)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudConfig {
    /// Google Cloud project id
    #[serde(default)]
    pub project_id: String,

    /// Vertex AI region
    #[serde(default = "default_region")]
    pub region: String,

    /// Generative model
    #[serde(default = "default_cloud_model")]
    pub model: String,

    /// Embedding model
    #[serde(default = "default_cloud_embedding_model")]
    pub embedding_model: String,

    /// API base URL, derived from `region` when unset
    #[serde(default)]
    pub base_url: Option<String>,

    /// Key of the OAuth credential in the credential store
    #[serde(default = "default_credential_key")]
    pub credential_key: String,

    /// OAuth client used for token refresh
    #[serde(default)]
    pub oauth: OAuthClientConfig,
}

fn default_region() -> String {
    "us-central1".to_string()
}

fn default_cloud_model() -> String {
    "gemini-1.5-pro".to_string()
}

fn default_cloud_embedding_model() -> String {
    "text-embedding-004".to_string()
}

fn default_credential_key() -> String {
    "vertex".to_string()
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            region: default_region(),
            model: default_cloud_model(),
            embedding_model: default_cloud_embedding_model(),
            base_url: None,
            credential_key: default_credential_key(),
            oauth: OAuthClientConfig::default(),
        }
    }
}

impl CloudConfig {
    /// Base URL of the regional Vertex AI endpoint
    pub fn resolved_base_url(&self) -> String {
        self.base_url.as_deref().map_or_else(
            || format!("https://{}-aiplatform.googleapis.com", self.region),
            |url| url.trim_end_matches('/').to_string(),
        )
    }

    /// `projects/{project}/locations/{region}/publishers/google/models/{model}`
    pub fn model_resource(&self, model: &str) -> String {
        format!(
            "projects/{}/locations/{}/publishers/google/models/{model}",
            self.project_id, self.region
        )
    }
}

/// Stored configuration of one backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum BackendConfig {
    /// Hosted provider
    Hosted(HostedConfig),
    /// OpenAI-compatible server
    Compatible(CompatibleConfig),
    /// Local daemon
    LocalDaemon(LocalDaemonConfig),
    /// Local subprocess
    LocalSubprocess(SubprocessConfig),
    /// Cloud multi-modal provider
    CloudMultimodal(CloudConfig),
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self::Hosted(HostedConfig::default())
    }
}

impl BackendConfig {
    /// Parse a raw config value, rejecting unknown `backend` tags with
    /// [`InferenceError::UnsupportedBackend`]
    pub fn from_value(value: serde_json::Value) -> Result<Self, InferenceError> {
        check_backend_tag(&value)?;
        serde_json::from_value(value).map_err(|e| InferenceError::Configuration(e.to_string()))
    }

    /// Backend this configuration targets
    pub const fn kind(&self) -> BackendKind {
        match self {
            Self::Hosted(_) => BackendKind::Hosted,
            Self::Compatible(_) => BackendKind::Compatible,
            Self::LocalDaemon(_) => BackendKind::LocalDaemon,
            Self::LocalSubprocess(_) => BackendKind::LocalSubprocess,
            Self::CloudMultimodal(_) => BackendKind::CloudMultimodal,
        }
    }

    /// Completion model this configuration uses
    pub fn model(&self) -> String {
        match self {
            Self::Hosted(c) => c.model.clone(),
            Self::Compatible(c) => c.model.clone(),
            Self::LocalDaemon(c) => c.model.clone(),
            Self::LocalSubprocess(c) => c.model_path.display().to_string(),
            Self::CloudMultimodal(c) => c.model.clone(),
        }
    }

    /// Copy of this configuration with call-time overrides applied
    ///
    /// `model` replaces every model field of the backend (completion,
    /// embedding and image), so the override is honored whichever operation
    /// runs. `endpoint` replaces the base URL, the full chat URL, or the
    /// executable directory. `api_key` applies to key-authenticated backends.
    #[must_use]
    pub fn with_overrides(&self, overrides: &ConfigOverrides) -> Self {
        let mut config = self.clone();
        let model = overrides.model.as_deref().filter(|m| !m.trim().is_empty());
        let endpoint = overrides.endpoint.as_deref().filter(|e| !e.trim().is_empty());

        match &mut config {
            Self::Hosted(c) => {
                if let Some(model) = model {
                    model.clone_into(&mut c.model);
                    model.clone_into(&mut c.embedding_model);
                    model.clone_into(&mut c.image_model);
                }
                if let Some(endpoint) = endpoint {
                    endpoint.clone_into(&mut c.base_url);
                }
                if let Some(key) = &overrides.api_key {
                    c.api_key = Some(key.clone());
                }
            },
            Self::Compatible(c) => {
                if let Some(model) = model {
                    model.clone_into(&mut c.model);
                    c.embedding_model = Some(model.to_string());
                }
                if let Some(endpoint) = endpoint {
                    endpoint.clone_into(&mut c.endpoint);
                }
                if let Some(key) = &overrides.api_key {
                    c.api_key = Some(key.clone());
                }
            },
            Self::LocalDaemon(c) => {
                if let Some(model) = model {
                    model.clone_into(&mut c.model);
                    model.clone_into(&mut c.embedding_model);
                }
                if let Some(endpoint) = endpoint {
                    endpoint.clone_into(&mut c.base_url);
                }
            },
            Self::LocalSubprocess(c) => {
                if let Some(model) = model {
                    c.model_path = PathBuf::from(model);
                }
                if let Some(endpoint) = endpoint {
                    c.executable_dir = PathBuf::from(endpoint);
                }
            },
            Self::CloudMultimodal(c) => {
                if let Some(model) = model {
                    model.clone_into(&mut c.model);
                    model.clone_into(&mut c.embedding_model);
                }
                if let Some(endpoint) = endpoint {
                    c.base_url = Some(endpoint.to_string());
                }
            },
        }
        config
    }

    /// Reject configurations no adapter can be built from
    pub fn validate(&self) -> Result<(), InferenceError> {
        match self {
            Self::Hosted(c) if c.base_url.trim().is_empty() => {
                Err(InferenceError::Configuration("hosted base_url is empty".to_string()))
            },
            Self::Compatible(c) if !is_http_url(&c.endpoint) => Err(InferenceError::Configuration(
                format!("compatible endpoint must be an http(s) URL, got '{}'", c.endpoint),
            )),
            Self::Compatible(c) if c.model.trim().is_empty() => {
                Err(InferenceError::Configuration("compatible model is empty".to_string()))
            },
            Self::LocalDaemon(c) if !is_http_url(&c.base_url) => Err(InferenceError::Configuration(
                format!("local daemon base_url must be an http(s) URL, got '{}'", c.base_url),
            )),
            Self::LocalSubprocess(c) if c.model_path.as_os_str().is_empty() => Err(
                InferenceError::Configuration("local subprocess model_path is empty".to_string()),
            ),
            Self::CloudMultimodal(c) if c.project_id.trim().is_empty() => Err(
                InferenceError::Configuration("cloud project_id is empty".to_string()),
            ),
            _ => Ok(()),
        }
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

fn check_backend_tag(value: &serde_json::Value) -> Result<(), InferenceError> {
    match value.get("backend") {
        Some(serde_json::Value::String(name)) => {
            name.parse::<BackendKind>()?;
            Ok(())
        },
        Some(other) => Err(InferenceError::UnsupportedBackend(other.to_string())),
        None => Err(InferenceError::Configuration("missing 'backend' field".to_string())),
    }
}

/// Stored dispatch configuration: the default backend plus named alternates
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Default backend
    #[serde(flatten)]
    pub backend: BackendConfig,

    /// Alternate configurations selectable per call by name
    #[serde(default)]
    pub alternates: BTreeMap<String, BackendConfig>,
}

impl DispatchConfig {
    /// Dispatch configuration with no alternates
    pub fn new(backend: BackendConfig) -> Self {
        Self {
            backend,
            alternates: BTreeMap::new(),
        }
    }

    /// Register a named alternate
    #[must_use]
    pub fn with_alternate(mut self, name: impl Into<String>, config: BackendConfig) -> Self {
        self.alternates.insert(name.into(), config);
        self
    }

    /// Parse a raw config value, rejecting unknown backend tags with
    /// [`InferenceError::UnsupportedBackend`]
    pub fn from_value(value: serde_json::Value) -> Result<Self, InferenceError> {
        check_backend_tag(&value)?;
        if let Some(serde_json::Value::Object(alternates)) = value.get("alternates") {
            for alternate in alternates.values() {
                check_backend_tag(alternate)?;
            }
        }
        serde_json::from_value(value).map_err(|e| InferenceError::Configuration(e.to_string()))
    }

    /// Effective configuration for one call
    ///
    /// Picks the alternate named by `overrides.profile` (unknown names are a
    /// configuration error), applies the remaining overrides to a copy, and
    /// validates the result. The stored configuration is left untouched.
    pub fn resolve(&self, overrides: &ConfigOverrides) -> Result<BackendConfig, InferenceError> {
        let base = match overrides.profile.as_deref() {
            Some(name) => self.alternates.get(name).ok_or_else(|| {
                InferenceError::Configuration(format!("unknown configuration profile '{name}'"))
            })?,
            None => &self.backend,
        };
        let config = base.with_overrides(overrides);
        config.validate()?;
        Ok(config)
    }
}

/// Call-time overrides; every set field wins over the stored configuration
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Model id
    pub model: Option<String>,
    /// API key
    pub api_key: Option<SecretString>,
    /// Base URL, full endpoint URL, or executable directory
    pub endpoint: Option<String>,
    /// Name of an alternate configuration
    pub profile: Option<String>,
}

impl ConfigOverrides {
    /// Override only the model
    pub fn model(model: impl Into<String>) -> Self {
        Self {
            model: Some(model.into()),
            ..Default::default()
        }
    }

    /// Select a named alternate
    pub fn profile(name: impl Into<String>) -> Self {
        Self {
            profile: Some(name.into()),
            ..Default::default()
        }
    }
}

/// Dispatcher settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Deadline applied when a call carries none
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,

    /// Catalog JSON file; the embedded catalog is used when unset
    #[serde(default)]
    pub catalog_path: Option<PathBuf>,
}

const fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: default_timeout_ms(),
            catalog_path: None,
        }
    }
}
