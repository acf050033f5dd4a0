//! Shared HTTP plumbing for the network backends

use domain::BackendKind;
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use tracing::{debug, warn};

use crate::{error::InferenceError, normalize::error_message};

/// HTTP client shared by all adapters of a dispatcher
///
/// No client-level timeout is set; deadlines are applied per call.
pub fn build_client() -> Result<Client, InferenceError> {
    Client::builder()
        .user_agent(concat!("modelgate/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| InferenceError::Configuration(format!("cannot build HTTP client: {e}")))
}

/// POST `body` as JSON and return the parsed success body
///
/// Non-success statuses and success bodies carrying an `error` envelope
/// become [`InferenceError::Provider`]; unparseable bodies become
/// [`InferenceError::MalformedResponse`]. The request body is logged only
/// when `log_body` is set.
pub async fn send_json(
    backend: BackendKind,
    request: RequestBuilder,
    body: &Value,
    log_body: bool,
) -> Result<Value, InferenceError> {
    if log_body {
        debug!(%backend, body = %body, "Sending request");
    }

    let response = request.json(body).send().await.map_err(|e| {
        warn!(%backend, error = %e, "Request to backend failed");
        InferenceError::from(e)
    })?;

    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
        let message = serde_json::from_str::<Value>(&text)
            .ok()
            .as_ref()
            .and_then(error_message)
            .unwrap_or_else(|| {
                if text.trim().is_empty() {
                    status.to_string()
                } else {
                    text.clone()
                }
            });
        warn!(%backend, status = %status, error = %message, "Backend returned an error");
        return Err(InferenceError::provider(
            backend,
            Some(status.as_u16()),
            message,
        ));
    }

    let value: Value = serde_json::from_str(&text)
        .map_err(|e| InferenceError::malformed(backend, format!("invalid JSON body: {e}")))?;

    if value.get("error").is_some_and(|e| !e.is_null()) {
        let message = error_message(&value).unwrap_or_else(|| value.to_string());
        warn!(%backend, error = %message, "Backend returned an error envelope");
        return Err(InferenceError::provider(
            backend,
            Some(status.as_u16()),
            message,
        ));
    }

    if log_body {
        debug!(%backend, response = %value, "Received response");
    }
    Ok(value)
}

/// Join a base URL and a path without doubling slashes
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    use super::*;

    #[test]
    fn join_url_handles_slashes() {
        assert_eq!(join_url("http://a/", "/v1/x"), "http://a/v1/x");
        assert_eq!(join_url("http://a", "v1/x"), "http://a/v1/x");
    }

    #[tokio::test]
    async fn error_status_uses_envelope_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/x"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(json!({"error": {"message": "Incorrect API key"}})),
            )
            .mount(&server)
            .await;

        let client = build_client().unwrap();
        let err = send_json(
            BackendKind::Hosted,
            client.post(format!("{}/x", server.uri())),
            &json!({}),
            false,
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            InferenceError::Provider { status: Some(401), ref message, .. } if message == "Incorrect API key"
        ));
    }

    #[tokio::test]
    async fn error_envelope_on_success_status_is_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"error": "boom"})))
            .mount(&server)
            .await;

        let client = build_client().unwrap();
        let err = send_json(BackendKind::LocalDaemon, client.post(server.uri()), &json!({}), true)
            .await
            .unwrap_err();
        assert!(matches!(err, InferenceError::Provider { .. }));
    }

    #[tokio::test]
    async fn non_json_success_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let client = build_client().unwrap();
        let err = send_json(BackendKind::Compatible, client.post(server.uri()), &json!({}), false)
            .await
            .unwrap_err();
        assert!(matches!(err, InferenceError::MalformedResponse { .. }));
    }

    #[tokio::test]
    async fn connection_refused_is_connection_failed() {
        let client = build_client().unwrap();
        let err = send_json(
            BackendKind::LocalDaemon,
            client.post("http://127.0.0.1:1/api/chat"),
            &json!({}),
            false,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, InferenceError::ConnectionFailed(_)));
    }
}
