//! OAuth credential lifecycle
//!
//! [`CredentialManager`] hands out access tokens for a stored credential,
//! refreshing it when it is about to expire. Refreshes of one credential are
//! serialized: a caller that waited for another caller's refresh reloads the
//! credential and reuses the new token instead of refreshing again.

mod memory;
mod oauth;

use std::{collections::HashMap, fmt, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

pub use self::{memory::MemoryCredentialStore, oauth::OAuthTokenRefresher};
use crate::{
    config::OAuthClientConfig,
    error::InferenceError,
    ports::{CredentialStore, TokenRefresher},
};

/// Tokens are refreshed this long before they expire
pub const DEFAULT_REFRESH_SKEW: Duration = Duration::from_secs(60);

/// Persisted OAuth credential
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthCredential {
    /// Bearer token
    pub access_token: String,
    /// Token used to obtain a new access token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Expiry of `access_token`
    pub expires_at: DateTime<Utc>,
}

impl fmt::Debug for OAuthCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthCredential")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl OAuthCredential {
    /// Create a credential
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            expires_at,
        }
    }

    /// Credential resulting from a refresh grant
    ///
    /// Providers may omit the refresh token from the grant; the previous one
    /// stays valid in that case.
    pub fn from_grant(grant: TokenGrant, previous_refresh: Option<String>, now: DateTime<Utc>) -> Self {
        let lifetime = i64::try_from(grant.expires_in).unwrap_or(i64::MAX);
        Self {
            access_token: grant.access_token,
            refresh_token: grant.refresh_token.or(previous_refresh),
            expires_at: now + chrono::Duration::seconds(lifetime.min(i64::from(u32::MAX))),
        }
    }

    /// Lifecycle state at `now`, treating tokens within `skew` of expiry as expiring
    pub fn state_at(&self, now: DateTime<Utc>, skew: Duration) -> CredentialState {
        let skew = chrono::Duration::from_std(skew).unwrap_or_else(|_| chrono::Duration::days(365));
        if now + skew < self.expires_at {
            CredentialState::Valid
        } else {
            CredentialState::Expiring
        }
    }
}

/// Result of a refresh grant
#[derive(Clone, PartialEq, Eq)]
pub struct TokenGrant {
    /// New access token
    pub access_token: String,
    /// Rotated refresh token, if the provider issued one
    pub refresh_token: Option<String>,
    /// Lifetime of the access token in seconds
    pub expires_in: u64,
}

impl fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenGrant")
            .field("access_token", &"[REDACTED]")
            .field("expires_in", &self.expires_in)
            .finish_non_exhaustive()
    }
}

/// Lifecycle state of a credential
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialState {
    /// Usable as-is
    Valid,
    /// Expired or within the refresh skew
    Expiring,
    /// A refresh is in flight
    Refreshing,
    /// The last refresh failed; re-authorization may be required
    Failed,
}

/// Exclusive hold on a stored credential, released on drop
pub struct CredentialLock {
    _guard: Box<dyn Send + Sync>,
}

impl fmt::Debug for CredentialLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialLock").finish_non_exhaustive()
    }
}

impl CredentialLock {
    /// Lock held for as long as `guard` lives
    pub fn new(guard: impl Send + Sync + 'static) -> Self {
        Self {
            _guard: Box::new(guard),
        }
    }
}

/// Hands out access tokens, refreshing them when needed
pub struct CredentialManager {
    store: Arc<dyn CredentialStore>,
    refresher: Arc<dyn TokenRefresher>,
    skew: Duration,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    states: RwLock<HashMap<String, CredentialState>>,
}

impl fmt::Debug for CredentialManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialManager")
            .field("skew", &self.skew)
            .field("states", &*self.states.read())
            .finish_non_exhaustive()
    }
}

impl CredentialManager {
    /// Manager over `store`, refreshing through `refresher`
    pub fn new(store: Arc<dyn CredentialStore>, refresher: Arc<dyn TokenRefresher>) -> Self {
        Self {
            store,
            refresher,
            skew: DEFAULT_REFRESH_SKEW,
            locks: Mutex::new(HashMap::new()),
            states: RwLock::new(HashMap::new()),
        }
    }

    /// Refresh tokens this long before they expire
    #[must_use]
    pub const fn with_skew(mut self, skew: Duration) -> Self {
        self.skew = skew;
        self
    }

    /// Last observed state of the credential under `key`
    pub fn state(&self, key: &str) -> Option<CredentialState> {
        self.states.read().get(key).copied()
    }

    fn set_state(&self, key: &str, state: CredentialState) {
        self.states.write().insert(key.to_string(), state);
    }

    fn lock_for(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(self.locks.lock().entry(key.to_string()).or_default())
    }

    async fn load(&self, key: &str) -> Result<OAuthCredential, InferenceError> {
        self.store.load(key).await?.ok_or_else(|| {
            InferenceError::AuthorizationDenied(format!(
                "no credential stored under '{key}'; authorize first"
            ))
        })
    }

    /// Valid access token for the credential under `key`
    #[instrument(skip(self, client))]
    pub async fn access_token(
        &self,
        key: &str,
        client: &OAuthClientConfig,
    ) -> Result<String, InferenceError> {
        let credential = self.load(key).await?;
        if credential.state_at(Utc::now(), self.skew) == CredentialState::Valid {
            self.set_state(key, CredentialState::Valid);
            return Ok(credential.access_token);
        }

        self.set_state(key, CredentialState::Expiring);
        let lock = self.lock_for(key);
        let _guard = lock.lock().await;
        // other processes sharing the store
        let _held = self.store.lock(key).await?;

        // another caller may have refreshed while we waited
        let credential = self.load(key).await?;
        if credential.state_at(Utc::now(), self.skew) == CredentialState::Valid {
            debug!("Credential refreshed by another caller");
            self.set_state(key, CredentialState::Valid);
            return Ok(credential.access_token);
        }

        self.set_state(key, CredentialState::Refreshing);
        match self.refresh(key, credential, client).await {
            Ok(token) => {
                self.set_state(key, CredentialState::Valid);
                Ok(token)
            },
            Err(err) => {
                warn!(error = %err, "Credential refresh failed");
                self.set_state(key, CredentialState::Failed);
                Err(err)
            },
        }
    }

    async fn refresh(
        &self,
        key: &str,
        credential: OAuthCredential,
        client: &OAuthClientConfig,
    ) -> Result<String, InferenceError> {
        let Some(refresh_token) = credential.refresh_token else {
            return Err(InferenceError::AuthorizationDenied(format!(
                "credential '{key}' expired and has no refresh token; re-authorize"
            )));
        };

        let grant = self
            .refresher
            .refresh(client, &refresh_token)
            .await
            .map_err(|e| match e {
                InferenceError::CredentialRefreshFailed(_) => e,
                other => InferenceError::CredentialRefreshFailed(other.to_string()),
            })?;

        let refreshed = OAuthCredential::from_grant(grant, Some(refresh_token), Utc::now());
        self.store.save(key, &refreshed).await?;
        self.store.notify_refreshed(key).await?;
        info!(expires_at = %refreshed.expires_at, "Refreshed OAuth credential");
        Ok(refreshed.access_token)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::ports::{MockCredentialStore, MockTokenRefresher};

    fn client() -> OAuthClientConfig {
        OAuthClientConfig {
            client_id: "client".to_string(),
            ..Default::default()
        }
    }

    fn expiring(refresh: Option<&str>) -> OAuthCredential {
        OAuthCredential::new(
            "old-token",
            refresh.map(ToString::to_string),
            Utc::now() + chrono::Duration::seconds(10),
        )
    }

    fn grant(token: &str) -> TokenGrant {
        TokenGrant {
            access_token: token.to_string(),
            refresh_token: None,
            expires_in: 3600,
        }
    }

    #[derive(Default)]
    struct SlowRefresher {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TokenRefresher for SlowRefresher {
        async fn refresh(
            &self,
            _client: &OAuthClientConfig,
            refresh_token: &str,
        ) -> Result<TokenGrant, InferenceError> {
            assert_eq!(refresh_token, "refresh-1");
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(grant("new-token"))
        }
    }

    #[test]
    fn state_respects_skew() {
        let now = Utc::now();
        let credential = OAuthCredential::new("t", None, now + chrono::Duration::seconds(30));
        assert_eq!(
            credential.state_at(now, Duration::from_secs(60)),
            CredentialState::Expiring
        );
        assert_eq!(
            credential.state_at(now, Duration::from_secs(10)),
            CredentialState::Valid
        );
    }

    #[test]
    fn grant_keeps_previous_refresh_token() {
        let now = Utc::now();
        let credential = OAuthCredential::from_grant(grant("a"), Some("r".to_string()), now);
        assert_eq!(credential.refresh_token.as_deref(), Some("r"));
        assert_eq!(credential.expires_at, now + chrono::Duration::seconds(3600));
    }

    #[test]
    fn debug_output_redacts_tokens() {
        let debug = format!("{:?}", expiring(Some("refresh-secret")));
        assert!(!debug.contains("old-token"));
        assert!(!debug.contains("refresh-secret"));
    }

    #[tokio::test]
    async fn valid_token_is_returned_without_refresh() {
        let store = MemoryCredentialStore::new().with_credential(
            "vertex",
            OAuthCredential::new("fresh", None, Utc::now() + chrono::Duration::hours(1)),
        );
        let mut refresher = MockTokenRefresher::new();
        refresher.expect_refresh().times(0);

        let manager = CredentialManager::new(Arc::new(store), Arc::new(refresher));
        assert_eq!(manager.access_token("vertex", &client()).await.unwrap(), "fresh");
        assert_eq!(manager.state("vertex"), Some(CredentialState::Valid));
    }

    #[tokio::test]
    async fn concurrent_callers_share_a_single_refresh() {
        let store = Arc::new(
            MemoryCredentialStore::new().with_credential("vertex", expiring(Some("refresh-1"))),
        );
        let refresher = Arc::new(SlowRefresher::default());
        let manager = CredentialManager::new(
            Arc::clone(&store) as Arc<dyn CredentialStore>,
            Arc::clone(&refresher) as Arc<dyn TokenRefresher>,
        );

        let client = client();
        let (a, b) = tokio::join!(
            manager.access_token("vertex", &client),
            manager.access_token("vertex", &client)
        );

        assert_eq!(a.unwrap(), "new-token");
        assert_eq!(b.unwrap(), "new-token");
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.save_count(), 1);
        assert_eq!(store.notification_count(), 1);
        assert_eq!(manager.state("vertex"), Some(CredentialState::Valid));
    }

    #[tokio::test]
    async fn missing_refresh_token_requires_reauthorization() {
        let store = MemoryCredentialStore::new().with_credential("vertex", expiring(None));
        let mut refresher = MockTokenRefresher::new();
        refresher.expect_refresh().times(0);

        let manager = CredentialManager::new(Arc::new(store), Arc::new(refresher));
        let err = manager.access_token("vertex", &client()).await.unwrap_err();
        assert!(matches!(err, InferenceError::AuthorizationDenied(_)));
        assert_eq!(manager.state("vertex"), Some(CredentialState::Failed));
    }

    #[tokio::test]
    async fn refresher_rejection_is_refresh_failure() {
        let store = MemoryCredentialStore::new().with_credential("vertex", expiring(Some("r")));
        let mut refresher = MockTokenRefresher::new();
        refresher
            .expect_refresh()
            .times(1)
            .returning(|_, _| Err(InferenceError::RequestFailed("invalid_grant".to_string())));

        let manager = CredentialManager::new(Arc::new(store), Arc::new(refresher));
        let err = manager.access_token("vertex", &client()).await.unwrap_err();
        assert!(matches!(err, InferenceError::CredentialRefreshFailed(m) if m.contains("invalid_grant")));
    }

    #[tokio::test]
    async fn unknown_key_is_authorization_denied() {
        let mut store = MockCredentialStore::new();
        store.expect_load().returning(|_| Ok(None));
        store.expect_lock().times(0);
        let manager =
            CredentialManager::new(Arc::new(store), Arc::new(MockTokenRefresher::new()));
        let err = manager.access_token("missing", &client()).await.unwrap_err();
        assert!(err.to_string().contains("no credential stored under 'missing'"));
    }

    #[tokio::test]
    async fn save_failure_is_propagated() {
        let mut store = MockCredentialStore::new();
        store
            .expect_load()
            .returning(|_| Ok(Some(expiring(Some("r")))));
        store
            .expect_save()
            .times(1)
            .returning(|_, _| Err(InferenceError::CredentialStore("disk full".to_string())));
        store
            .expect_lock()
            .times(1)
            .returning(|_| Ok(CredentialLock::new(())));
        store.expect_notify_refreshed().times(0);
        let mut refresher = MockTokenRefresher::new();
        refresher.expect_refresh().returning(|_, _| Ok(grant("t")));

        let manager = CredentialManager::new(Arc::new(store), Arc::new(refresher));
        let err = manager.access_token("vertex", &client()).await.unwrap_err();
        assert!(matches!(err, InferenceError::CredentialStore(_)));
    }

    #[tokio::test]
    async fn store_lock_failure_stops_refresh() {
        let mut store = MockCredentialStore::new();
        store
            .expect_load()
            .times(1)
            .returning(|_| Ok(Some(expiring(Some("r")))));
        store
            .expect_lock()
            .times(1)
            .returning(|_| Err(InferenceError::CredentialStore("lock timed out".to_string())));
        store.expect_save().times(0);
        let mut refresher = MockTokenRefresher::new();
        refresher.expect_refresh().times(0);

        let manager = CredentialManager::new(Arc::new(store), Arc::new(refresher));
        let err = manager.access_token("vertex", &client()).await.unwrap_err();
        assert!(matches!(err, InferenceError::CredentialStore(m) if m.contains("lock")));
    }

    #[tokio::test]
    async fn managers_sharing_a_store_refresh_once() {
        let store = Arc::new(
            MemoryCredentialStore::new().with_credential("vertex", expiring(Some("refresh-1"))),
        );
        let refresher = Arc::new(SlowRefresher::default());
        let first = CredentialManager::new(
            Arc::clone(&store) as Arc<dyn CredentialStore>,
            Arc::clone(&refresher) as Arc<dyn TokenRefresher>,
        );
        let second = CredentialManager::new(
            Arc::clone(&store) as Arc<dyn CredentialStore>,
            Arc::clone(&refresher) as Arc<dyn TokenRefresher>,
        );

        let client = client();
        let (a, b) = tokio::join!(
            first.access_token("vertex", &client),
            second.access_token("vertex", &client)
        );

        assert_eq!(a.unwrap(), "new-token");
        assert_eq!(b.unwrap(), "new-token");
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.notification_count(), 1);
    }
}
