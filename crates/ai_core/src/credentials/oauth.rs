//! OAuth2 refresh-token grant

use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use super::TokenGrant;
use crate::{config::OAuthClientConfig, error::InferenceError, ports::TokenRefresher};

const DEFAULT_EXPIRES_IN: u64 = 3600;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Refreshes tokens with a form-encoded `grant_type=refresh_token` request
#[derive(Debug, Clone)]
pub struct OAuthTokenRefresher {
    client: Client,
}

impl OAuthTokenRefresher {
    /// Refresher sending requests through `client`
    pub const fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TokenRefresher for OAuthTokenRefresher {
    #[instrument(skip(self, client, refresh_token), fields(token_url = %client.token_url))]
    async fn refresh(
        &self,
        client: &OAuthClientConfig,
        refresh_token: &str,
    ) -> Result<TokenGrant, InferenceError> {
        let mut form = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", client.client_id.as_str()),
        ];
        if let Some(secret) = &client.client_secret {
            form.push(("client_secret", secret.expose_secret()));
        }

        debug!("Requesting token refresh");
        let response = self.client.post(&client.token_url).form(&form).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<TokenErrorResponse>(&body).map_or_else(
                |_| format!("{status}: {body}"),
                |e| match e.error_description {
                    Some(description) => format!("{}: {description}", e.error),
                    None => e.error,
                },
            );
            warn!(status = %status, error = %message, "Token endpoint rejected refresh");
            return Err(InferenceError::CredentialRefreshFailed(message));
        }

        let token: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            InferenceError::CredentialRefreshFailed(format!("invalid token response: {e}"))
        })?;
        Ok(TokenGrant {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_in: token.expires_in.unwrap_or(DEFAULT_EXPIRES_IN),
        })
    }
}
