//! Service-account token cache for backend API calls.
//!
//! The gateway authenticates to the backend with a short-lived JWT issued by
//! `POST /api/authenticate`. The token is cached in memory and re-issued when
//! it approaches expiry or when the backend rejects it. The cache is guarded
//! by a mutex held across issuance, so concurrent requests that miss the
//! cache serialize on one issuance call instead of each issuing their own.

use crate::config::BackendSettings;
use crate::utils::jwt::decode_token_expiry;
use anyhow::{Context, Result};
use reqwest::Client;
use secrecy::ExposeSecret;
use tokio::sync::Mutex;

/// Seconds before `exp` at which a cached token is considered stale.
const EXPIRY_BUFFER_SECS: i64 = 60;

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: i64,
}

impl CachedToken {
    fn is_fresh(&self, now: i64) -> bool {
        now < self.expires_at - EXPIRY_BUFFER_SECS
    }
}

pub struct ServiceTokenCache {
    http: Client,
    settings: BackendSettings,
    slot: Mutex<Option<CachedToken>>,
}

impl ServiceTokenCache {
    pub fn new(http: Client, settings: BackendSettings) -> Self {
        Self {
            http,
            settings,
            slot: Mutex::new(None),
        }
    }

    /// Returns the cached token if it is still fresh. No side effects.
    pub async fn cached(&self) -> Option<String> {
        let slot = self.slot.lock().await;
        let now = chrono::Utc::now().timestamp();
        slot.as_ref()
            .filter(|t| t.is_fresh(now))
            .map(|t| t.token.clone())
    }

    /// Returns a usable token, issuing a fresh one when the cache is empty or
    /// stale. Callers racing on an empty cache queue on the lock; the losers
    /// see the winner's token instead of issuing again.
    pub async fn current(&self) -> Result<String> {
        let mut slot = self.slot.lock().await;
        let now = chrono::Utc::now().timestamp();
        if let Some(cached) = slot.as_ref() {
            if cached.is_fresh(now) {
                return Ok(cached.token.clone());
            }
        }

        let issued = self.issue().await?;
        let token = issued.token.clone();
        *slot = Some(issued);
        Ok(token)
    }

    /// Unconditionally issues a fresh token, replacing whatever was cached.
    /// Used after the backend answered 401 to a supposedly valid token.
    pub async fn refresh(&self) -> Result<String> {
        let mut slot = self.slot.lock().await;
        let issued = self.issue().await?;
        let token = issued.token.clone();
        *slot = Some(issued);
        Ok(token)
    }

    async fn issue(&self) -> Result<CachedToken> {
        let base_url = self
            .settings
            .base_url()
            .context("API base URL not configured")?;
        let url = format!("{}/api/authenticate", base_url);

        let body = serde_json::json!({
            "username": self.settings.service_user,
            "password": self.settings.service_password.expose_secret(),
            "rememberMe": true,
        });

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Failed to reach authenticate endpoint at {}", url))?;

        if !response.status().is_success() {
            let status = response.status();
            tracing::error!(%status, "Backend token issuance failed");
            anyhow::bail!("Failed to fetch API token from backend: {}", status);
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .context("Authenticate endpoint returned a non-JSON body")?;

        let token = payload["id_token"]
            .as_str()
            .context("No id_token returned from backend")?
            .to_string();

        let expires_at = decode_token_expiry(&token)?;

        tracing::debug!(expires_at, "Issued backend service token");

        Ok(CachedToken { token, expires_at })
    }
}
