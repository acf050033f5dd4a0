//! Integration tests for infrastructure crate
//!
//! Tests cover:
//! - Loading configuration from a file into a working dispatcher
//! - OAuth refresh persisted through the file credential store
//! - Workers sharing one credential file refresh exactly once

use std::{
    io::Write,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use ai_core::{
    CompletionOptions, CredentialManager, CredentialStore, InferenceError, OAuthClientConfig,
    OAuthCredential, TokenGrant, TokenRefresher,
};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use domain::CompletionRequest;
use infrastructure::{AppConfig, EnvSecretResolver, FileCredentialStore, build_dispatcher};
use serde_json::json;
use tempfile::TempDir;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_string_contains, header, method, path},
};

// ============================================================================
// Test Helpers
// ============================================================================

fn write_config(dir: &TempDir, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join("modelgate.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    path
}

// ============================================================================
// Daemon Through Configuration
// ============================================================================

mod daemon_tests {
    use super::*;

    #[tokio::test]
    async fn configured_daemon_serves_completion() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "llama3.2",
                "message": {"role": "assistant", "content": "Hello from the daemon"},
                "done": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let config_path = write_config(
            &dir,
            &format!(
                r#"
                [dispatch]
                backend = "local_daemon"
                base_url = "{}"
                model = "llama3.2"
                "#,
                server.uri()
            ),
        );

        let config = AppConfig::load(Some(&config_path)).unwrap();
        let dispatcher = build_dispatcher(&config).unwrap();
        let response = dispatcher
            .complete(
                &config.dispatch,
                CompletionOptions::new(CompletionRequest::simple("Hi")),
            )
            .await
            .unwrap();
        assert_eq!(response.as_text(), "Hello from the daemon");
    }
}

// ============================================================================
// Cloud Credentials Through the File Store
// ============================================================================

mod cloud_tests {
    use super::*;

    #[tokio::test]
    async fn expired_credential_is_refreshed_and_persisted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .and(body_string_contains("refresh_token=stored-refresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "ya29.renewed",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(
                "/v1/projects/demo/locations/europe-west4/publishers/google/models/gemini-1.5-pro:generateContent",
            ))
            .and(header("authorization", "Bearer ya29.renewed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"role": "model", "parts": [{"text": "Bonjour"}]}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let store_path = dir.path().join("credentials.toml");
        let seed = FileCredentialStore::new(&store_path);
        seed.save(
            "vertex",
            &OAuthCredential::new(
                "ya29.stale",
                Some("stored-refresh".to_string()),
                Utc::now() - Duration::minutes(5),
            ),
        )
        .await
        .unwrap();

        let config_path = write_config(
            &dir,
            &format!(
                r#"
                [dispatch]
                backend = "cloud_multimodal"
                project_id = "demo"
                region = "europe-west4"
                base_url = "{uri}"

                [dispatch.oauth]
                token_url = "{uri}/oauth/token"
                client_id = "modelgate"

                [credentials]
                store_path = "{store}"
                "#,
                uri = server.uri(),
                store = store_path.display()
            ),
        );

        let mut config = AppConfig::load(Some(&config_path)).unwrap();
        EnvSecretResolver::with_lookup(|_| None).resolve(&mut config.dispatch);
        let dispatcher = build_dispatcher(&config).unwrap();

        let response = dispatcher
            .complete(
                &config.dispatch,
                CompletionOptions::new(CompletionRequest::simple("Say hello in French")),
            )
            .await
            .unwrap();
        assert_eq!(response.as_text(), "Bonjour");

        let stored = seed.load("vertex").await.unwrap().unwrap();
        assert_eq!(stored.access_token, "ya29.renewed");
        assert_eq!(stored.refresh_token.as_deref(), Some("stored-refresh"));
        assert_eq!(seed.refresh_generation().await.unwrap(), 1);
    }
}

// ============================================================================
// Workers Sharing One Credential File
// ============================================================================

mod shared_store_tests {
    use super::*;

    #[derive(Default)]
    struct CountingRefresher {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TokenRefresher for CountingRefresher {
        async fn refresh(
            &self,
            _client: &OAuthClientConfig,
            _refresh_token: &str,
        ) -> Result<TokenGrant, InferenceError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            Ok(TokenGrant {
                access_token: format!("tok-{call}"),
                refresh_token: None,
                expires_in: 3600,
            })
        }
    }

    #[tokio::test]
    async fn two_managers_on_one_file_refresh_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("creds.toml");
        let seed = FileCredentialStore::new(&path);
        seed.save(
            "vertex",
            &OAuthCredential::new(
                "tok-0",
                Some("stored-refresh".to_string()),
                Utc::now() + Duration::seconds(5),
            ),
        )
        .await
        .unwrap();

        let refresher = Arc::new(CountingRefresher::default());
        let first = CredentialManager::new(
            Arc::new(FileCredentialStore::new(&path)),
            Arc::clone(&refresher) as Arc<dyn TokenRefresher>,
        );
        let second = CredentialManager::new(
            Arc::new(FileCredentialStore::new(&path)),
            Arc::clone(&refresher) as Arc<dyn TokenRefresher>,
        );

        let client = OAuthClientConfig::default();
        let (a, b) = tokio::join!(
            first.access_token("vertex", &client),
            second.access_token("vertex", &client)
        );

        assert_eq!(a.unwrap(), "tok-1");
        assert_eq!(b.unwrap(), "tok-1");
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);

        let stored = seed.load("vertex").await.unwrap().unwrap();
        assert_eq!(stored.access_token, "tok-1");
        assert_eq!(seed.refresh_generation().await.unwrap(), 1);
    }
}
