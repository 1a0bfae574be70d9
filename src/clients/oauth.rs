//! OAuth refresh-token flow shared by both HTTP clients.
//!
//! Access tokens are cached per process behind an async lock and
//! re-acquired on cold start or expiry; nothing outlives one invocation
//! beyond this cache.

use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::config::SyncConfig;
use crate::error::{Result, SyncError};

/// Refresh slightly before the reported expiry to absorb clock skew.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<u64>,
    error: Option<String>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// Token source backed by the refresh-token grant.
pub struct OAuthTokenSource {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    refresh_token: String,
    cached: RwLock<Option<CachedToken>>,
}

impl OAuthTokenSource {
    pub fn new(http: reqwest::Client, config: &SyncConfig) -> Self {
        Self {
            http,
            token_url: format!("{}/oauth/v2/token", config.auth_host),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            refresh_token: config.refresh_token.clone(),
            cached: RwLock::new(None),
        }
    }

    /// Current access token, refreshing when absent or near expiry.
    pub async fn access_token(&self) -> Result<String> {
        if let Some(cached) = self.cached.read().await.as_ref() {
            if cached.expires_at > Instant::now() {
                return Ok(cached.token.clone());
            }
        }
        self.refresh().await
    }

    /// Drop the cached token and fetch a fresh one. Called when an
    /// upstream request reports the token expired mid-flight.
    pub async fn refresh(&self) -> Result<String> {
        let mut cached = self.cached.write().await;

        let response: TokenResponse = self
            .http
            .post(&self.token_url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", self.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await?
            .json()
            .await?;

        if let Some(error) = response.error {
            warn!(error = %error, "token refresh rejected");
            return Err(SyncError::Upstream {
                code: 0,
                message: error,
            });
        }

        let token = response
            .access_token
            .ok_or_else(|| SyncError::internal("token endpoint returned no access token"))?;
        let ttl = Duration::from_secs(response.expires_in.unwrap_or(3600));

        debug!(ttl_secs = ttl.as_secs(), "access token refreshed");
        *cached = Some(CachedToken {
            token: token.clone(),
            expires_at: Instant::now() + ttl.saturating_sub(EXPIRY_MARGIN),
        });
        Ok(token)
    }
}
