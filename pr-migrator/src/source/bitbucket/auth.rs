//! Bitbucket credentials and OAuth access token caching.

use super::wire::{error_message, TokenResponse};
use super::transport_error;
use crate::config::SourceCredentials;
use crate::error::RemoteError;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Tokens are refreshed this long before Bitbucket says they expire.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Bitbucket access tokens live two hours unless stated otherwise.
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(7200);

/// How the adapter authenticates against Bitbucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BitbucketAuth {
    /// Static bearer token (repository, workspace or app access token).
    Token(String),

    /// OAuth consumer exchanging its key and secret for short-lived tokens.
    OAuth {
        key: String,
        secret: String,
        token_url: String,
    },
}

impl BitbucketAuth {
    /// Builds the auth mode from resolved credentials.
    #[must_use]
    pub fn from_credentials(credentials: SourceCredentials, token_url: &str) -> Self {
        match credentials {
            SourceCredentials::Token(token) => Self::Token(token),
            SourceCredentials::OAuth { key, secret } => Self::OAuth {
                key,
                secret,
                token_url: token_url.to_string(),
            },
        }
    }
}

#[derive(Debug)]
struct CachedToken {
    value: String,
    refresh_at: Instant,
}

/// Hands out bearer tokens, exchanging OAuth credentials when needed.
#[derive(Debug)]
pub(super) struct Authenticator {
    auth: BitbucketAuth,
    cached: Mutex<Option<CachedToken>>,
}

impl Authenticator {
    pub fn new(auth: BitbucketAuth) -> Self {
        Self {
            auth,
            cached: Mutex::new(None),
        }
    }

    /// Returns a bearer token valid for at least [`REFRESH_MARGIN`].
    pub async fn bearer(&self, client: &reqwest::Client) -> Result<String, RemoteError> {
        let (key, secret, token_url) = match &self.auth {
            BitbucketAuth::Token(token) => return Ok(token.clone()),
            BitbucketAuth::OAuth {
                key,
                secret,
                token_url,
            } => (key, secret, token_url),
        };

        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.value.clone());
            }
        }

        debug!("Requesting Bitbucket OAuth access token");
        let response = client
            .post(token_url)
            .basic_auth(key, Some(secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| transport_error("obtain access token", e))?;

        let status = response.status();
        let headers = response.headers().clone();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = error_message(&body).or_else(|| Some(body).filter(|b| !b.is_empty()));
            return Err(RemoteError::from_status(
                "obtain access token",
                "OAuth token endpoint",
                status,
                &headers,
                message,
            ));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| RemoteError::fatal("obtain access token", e.to_string()))?;

        let lifetime = token
            .expires_in
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TOKEN_LIFETIME);
        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            refresh_at: Instant::now() + lifetime.saturating_sub(REFRESH_MARGIN),
        });

        Ok(token.access_token)
    }
}
