//! Dispatcher construction from application configuration

use std::sync::Arc;

use ai_core::{
    CredentialManager, Dispatcher, InferenceError, OAuthTokenRefresher, http::build_client,
    registry::ModelRegistry,
};
use tracing::info;

use crate::{adapters::FileCredentialStore, config::AppConfig};

/// Dispatcher wired with the file credential store and OAuth refresher
///
/// All adapters share one HTTP client. The model catalog is read from
/// `dispatcher.catalog_path` when set.
pub fn build_dispatcher(config: &AppConfig) -> Result<Dispatcher, InferenceError> {
    let client = build_client()?;
    let registry = config
        .dispatcher
        .catalog_path
        .as_ref()
        .map_or_else(ModelRegistry::embedded, ModelRegistry::from_path);

    let store = Arc::new(FileCredentialStore::new(&config.credentials.store_path));
    let refresher = Arc::new(OAuthTokenRefresher::new(client.clone()));
    let credentials = CredentialManager::new(store, refresher)
        .with_skew(config.credentials.refresh_skew());

    info!(
        store = %config.credentials.store_path.display(),
        timeout_ms = config.dispatcher.default_timeout_ms,
        "Dispatcher ready"
    );
    Ok(
        Dispatcher::with_parts(client, Arc::new(registry), config.dispatcher.clone())
            .with_credentials(Arc::new(credentials)),
    )
}
