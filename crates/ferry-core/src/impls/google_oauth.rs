//! GoogleTokenRefresher - Google OAuth 2.0 の refresh_token グラント
//!
//! - `400 invalid_grant` / `401` → `RefreshError::Rejected`（再認証が必要）
//! - `429` / `5xx` / 通信失敗 → `RefreshError::Unavailable`（リトライ対象）
//! - 応答に新しい refresh token があれば置き換え、なければ従来のものを使い続ける

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Duration as ChronoDuration;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::domain::{Credential, TokenGrant};
use crate::ports::{Clock, RefreshError, TokenRefresher};

pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TokenErrorResponse {
    #[serde(default)]
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

pub struct GoogleTokenRefresher {
    client: Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    clock: Arc<dyn Clock>,
}

impl GoogleTokenRefresher {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, RefreshError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| RefreshError::Unavailable(format!("http client: {err}")))?;
        Ok(Self {
            client,
            token_url: GOOGLE_TOKEN_URL.to_string(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            clock,
        })
    }

    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self
    }
}

#[async_trait]
impl TokenRefresher for GoogleTokenRefresher {
    async fn refresh(&self, credential: &Credential) -> Result<TokenGrant, RefreshError> {
        let response = self
            .client
            .post(&self.token_url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", credential.refresh_token.as_str()),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|err| RefreshError::Unavailable(format!("network error: {}", err.without_url())))?;

        let status = response.status();
        if status.is_success() {
            let token: TokenResponse = response
                .json()
                .await
                .map_err(|err| {
                    RefreshError::Unavailable(format!("malformed token response: {}", err.without_url()))
                })?;
            return Ok(TokenGrant {
                access_token: token.access_token,
                expires_at: self.clock.now() + ChronoDuration::seconds(token.expires_in),
                refresh_token: token.refresh_token,
            });
        }

        let body: TokenErrorResponse = response.json().await.unwrap_or_default();
        let detail = match body.error_description {
            Some(description) => format!("{status} {}: {description}", body.error),
            None => format!("{status} {}", body.error),
        };
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            Err(RefreshError::Unavailable(detail))
        } else {
            Err(RefreshError::Rejected(detail))
        }
    }
}
