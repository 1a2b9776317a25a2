//! Bearer token provider (OAuth2 client-credentials grant)
//!
//! Tokens are cached until shortly before they expire and refreshed on
//! demand. Concurrent callers wait on the same refresh instead of each
//! requesting their own token.

use crate::config::AuthConfig;
use crate::error::{Error, Result};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Tokens are treated as expired this long before the server says they are
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: u64,
}

#[derive(Debug)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

/// Supplies bearer tokens for outgoing requests
#[derive(Debug)]
pub struct TokenProvider {
    client: reqwest::Client,
    config: AuthConfig,
    token: Mutex<Option<CachedToken>>,
}

impl TokenProvider {
    /// Create a provider for the configured identity service
    pub fn new(client: reqwest::Client, config: AuthConfig) -> Self {
        Self {
            client,
            config,
            token: Mutex::new(None),
        }
    }

    /// Token endpoint URL
    fn token_url(&self) -> String {
        format!(
            "{}/connect/token",
            self.config.identity_url.trim_end_matches('/')
        )
    }

    /// Return a valid access token, requesting a new one if the cached token
    /// is missing or about to expire
    pub async fn access_token(&self) -> Result<String> {
        let mut guard = self.token.lock().await;

        if let Some(cached) = guard.as_ref()
            && cached.expires_at > Instant::now()
        {
            return Ok(cached.access_token.clone());
        }

        let fresh = self.request_token().await?;
        let access_token = fresh.access_token.clone();
        *guard = Some(fresh);
        Ok(access_token)
    }

    async fn request_token(&self) -> Result<CachedToken> {
        let form = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("grant_type", "client_credentials"),
            ("scope", self.config.scopes.as_str()),
        ];

        let response = self
            .client
            .post(self.token_url())
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Auth(format!(
                "token endpoint returned HTTP {}",
                status.as_u16()
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::Auth(format!("invalid token response: {}", e)))?;

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(EXPIRY_MARGIN);
        tracing::info!(
            expires_in_secs = token.expires_in,
            "Obtained API access token"
        );

        Ok(CachedToken {
            access_token: token.access_token,
            expires_at: Instant::now() + lifetime,
        })
    }
}
