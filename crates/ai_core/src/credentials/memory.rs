//! In-memory credential store

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use super::{CredentialLock, OAuthCredential};
use crate::{error::InferenceError, ports::CredentialStore};

/// Credential store for a single process, used by tests and embedders that
/// manage persistence themselves
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    credentials: RwLock<HashMap<String, OAuthCredential>>,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    saves: AtomicUsize,
    notifications: AtomicUsize,
}

impl MemoryCredentialStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with one credential
    #[must_use]
    pub fn with_credential(self, key: impl Into<String>, credential: OAuthCredential) -> Self {
        self.credentials.write().insert(key.into(), credential);
        self
    }

    /// Number of successful `save` calls
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Number of refresh notifications received
    pub fn notification_count(&self) -> usize {
        self.notifications.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn load(&self, key: &str) -> Result<Option<OAuthCredential>, InferenceError> {
        Ok(self.credentials.read().get(key).cloned())
    }

    async fn save(&self, key: &str, credential: &OAuthCredential) -> Result<(), InferenceError> {
        self.credentials
            .write()
            .insert(key.to_string(), credential.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn notify_refreshed(&self, key: &str) -> Result<(), InferenceError> {
        debug!(key, "Credential refreshed");
        self.notifications.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn lock(&self, key: &str) -> Result<CredentialLock, InferenceError> {
        let lock = Arc::clone(self.locks.lock().entry(key.to_string()).or_default());
        Ok(CredentialLock::new(lock.lock_owned().await))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[tokio::test]
    async fn save_then_load() {
        let store = MemoryCredentialStore::new();
        assert!(store.load("k").await.unwrap().is_none());

        let credential = OAuthCredential::new("a", Some("r".to_string()), Utc::now());
        store.save("k", &credential).await.unwrap();

        assert_eq!(store.load("k").await.unwrap(), Some(credential));
        assert_eq!(store.save_count(), 1);
    }

    #[tokio::test]
    async fn lock_is_exclusive_per_key() {
        let store = MemoryCredentialStore::new();
        let held = store.lock("k").await.unwrap();

        let blocked =
            tokio::time::timeout(std::time::Duration::from_millis(20), store.lock("k")).await;
        assert!(blocked.is_err());
        assert!(store.lock("other").await.is_ok());

        drop(held);
        assert!(store.lock("k").await.is_ok());
    }
}
