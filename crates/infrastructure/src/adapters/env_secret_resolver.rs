//! Environment-based secret resolution
//!
//! Fills backend secrets that the configuration left empty from environment
//! variables. Useful for containerized deployments where secrets are
//! injected via environment and kept out of config files.

use std::env;

use ai_core::{BackendConfig, DispatchConfig};
use domain::BackendKind;
use secrecy::SecretString;
use tracing::debug;

use crate::config::ENV_PREFIX;

/// Resolves secrets from `MODELGATE_<BACKEND>_<FIELD>` variables
///
/// Only empty fields are filled; configured values always win. Keys are
/// `MODELGATE_HOSTED_API_KEY`, `MODELGATE_COMPATIBLE_API_KEY` and
/// `MODELGATE_CLOUD_MULTIMODAL_CLIENT_SECRET`.
#[derive(Debug, Clone)]
pub struct EnvSecretResolver {
    prefix: String,
    lookup: fn(&str) -> Option<String>,
}

impl Default for EnvSecretResolver {
    fn default() -> Self {
        Self {
            prefix: ENV_PREFIX.to_string(),
            lookup: |name| env::var(name).ok(),
        }
    }
}

impl EnvSecretResolver {
    /// Resolver reading the process environment
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolver reading variables through `lookup` instead of the environment
    pub fn with_lookup(lookup: fn(&str) -> Option<String>) -> Self {
        Self {
            lookup,
            ..Self::default()
        }
    }

    /// Variable name for a backend field
    pub fn var_name(&self, backend: BackendKind, field: &str) -> String {
        format!("{}_{}_{}", self.prefix, backend.as_str(), field).to_uppercase()
    }

    fn secret(&self, backend: BackendKind, field: &str) -> Option<SecretString> {
        let name = self.var_name(backend, field);
        let value = (self.lookup)(&name).filter(|v| !v.trim().is_empty())?;
        debug!(var = %name, "Loaded secret from environment");
        Some(SecretString::from(value))
    }

    /// Fill empty secrets of one backend configuration
    pub fn resolve_backend(&self, config: &mut BackendConfig) {
        let kind = config.kind();
        match config {
            BackendConfig::Hosted(c) if c.api_key.is_none() => {
                c.api_key = self.secret(kind, "api_key");
            },
            BackendConfig::Compatible(c) if c.api_key.is_none() => {
                c.api_key = self.secret(kind, "api_key");
            },
            BackendConfig::CloudMultimodal(c) if c.oauth.client_secret.is_none() => {
                c.oauth.client_secret = self.secret(kind, "client_secret");
            },
            _ => {},
        }
    }

    /// Fill empty secrets of the default backend and every alternate
    pub fn resolve(&self, config: &mut DispatchConfig) {
        self.resolve_backend(&mut config.backend);
        for alternate in config.alternates.values_mut() {
            self.resolve_backend(alternate);
        }
    }
}
