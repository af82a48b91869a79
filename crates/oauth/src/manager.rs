use std::{
    collections::HashMap,
    sync::{Arc, Mutex as StdMutex},
    time::Duration,
};

use {
    secrecy::{ExposeSecret, Secret},
    serde::Deserialize,
    tokio::sync::Mutex,
    tracing::{debug, info, warn},
};

use marquee_credentials::{CredentialStore, CredentialUpdate, OauthCredential, Provider};

use crate::{
    Error, Result,
    endpoints::token_endpoint,
};

/// Tokens within this many seconds of expiry are refreshed eagerly.
pub const DEFAULT_SAFETY_MARGIN_SECS: u64 = 60;

const REFRESH_TIMEOUT: Duration = Duration::from_secs(15);

/// A currently-valid access token.
#[derive(Clone)]
pub struct AccessToken {
    pub token: Secret<String>,
    /// Unix timestamp when the token expires, if the provider reported one.
    pub expires_at: Option<u64>,
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Shape of a refresh-grant response from Google or Microsoft.
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
    /// Microsoft may rotate the refresh token; Google never sends one here.
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Keeps per-tenant OAuth access tokens fresh.
///
/// Reads that observe a still-valid cached token take no lock. The slow path
/// (check expiry, refresh, persist) runs under a per-(tenant, provider)
/// mutex and re-reads the credential after acquiring it, so of two
/// concurrent sends that both saw an expired token only the first performs
/// the network refresh.
pub struct TokenManager {
    store: Arc<dyn CredentialStore>,
    http: reqwest::Client,
    token_url_override: Option<String>,
    safety_margin_secs: u64,
    locks: StdMutex<HashMap<(String, Provider), Arc<Mutex<()>>>>,
}

impl TokenManager {
    #[must_use]
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self {
            store,
            http: reqwest::Client::new(),
            token_url_override: None,
            safety_margin_secs: DEFAULT_SAFETY_MARGIN_SECS,
            locks: StdMutex::new(HashMap::new()),
        }
    }

    /// Route all refresh grants to a fixed URL instead of the provider's
    /// real token endpoint (used by tests).
    #[must_use]
    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url_override = Some(url.into());
        self
    }

    #[must_use]
    pub fn with_safety_margin(mut self, secs: u64) -> Self {
        self.safety_margin_secs = secs;
        self
    }

    /// Return a valid access token for the tenant's provider, refreshing and
    /// persisting if the cached one is missing or near expiry.
    pub async fn valid_access_token(
        &self,
        tenant_id: &str,
        provider: Provider,
    ) -> Result<AccessToken> {
        if !provider.is_oauth() {
            return Err(Error::NotOauth { provider });
        }

        let oauth = self.load_oauth(tenant_id).await?;
        if let Some(token) = self.cached_token(&oauth) {
            return Ok(token);
        }

        let lock = self.lock_for(tenant_id, provider);
        let _guard = lock.lock().await;

        // A concurrent send may have refreshed while we waited for the lock.
        let oauth = self.load_oauth(tenant_id).await?;
        if let Some(token) = self.cached_token(&oauth) {
            debug!(tenant_id, %provider, "token refreshed by concurrent send");
            return Ok(token);
        }

        self.refresh_locked(tenant_id, provider, &oauth).await
    }

    /// Refresh unconditionally, bypassing the expiry check. Used after a
    /// provider rejects a token the store still considered valid.
    pub async fn force_refresh(&self, tenant_id: &str, provider: Provider) -> Result<AccessToken> {
        if !provider.is_oauth() {
            return Err(Error::NotOauth { provider });
        }

        let lock = self.lock_for(tenant_id, provider);
        let _guard = lock.lock().await;

        let oauth = self.load_oauth(tenant_id).await?;
        self.refresh_locked(tenant_id, provider, &oauth).await
    }

    async fn load_oauth(&self, tenant_id: &str) -> Result<OauthCredential> {
        let credential = self.store.get(tenant_id).await?;
        credential.oauth.ok_or_else(|| Error::MissingOauthConfig {
            tenant_id: tenant_id.to_string(),
        })
    }

    fn cached_token(&self, oauth: &OauthCredential) -> Option<AccessToken> {
        if oauth.is_fresh(now_unix(), self.safety_margin_secs) {
            oauth.access_token.clone().map(|token| AccessToken {
                token,
                expires_at: oauth.expires_at,
            })
        } else {
            None
        }
    }

    fn lock_for(&self, tenant_id: &str, provider: Provider) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(
            locks
                .entry((tenant_id.to_string(), provider))
                .or_default(),
        )
    }

    /// Perform the refresh grant and persist the result. Caller must hold the
    /// per-(tenant, provider) lock.
    async fn refresh_locked(
        &self,
        tenant_id: &str,
        provider: Provider,
        oauth: &OauthCredential,
    ) -> Result<AccessToken> {
        let refresh_token =
            oauth
                .refresh_token
                .as_ref()
                .ok_or_else(|| Error::MissingRefreshToken {
                    tenant_id: tenant_id.to_string(),
                    provider,
                })?;

        let url = match &self.token_url_override {
            Some(url) => url.as_str(),
            None => token_endpoint(provider).ok_or(Error::NotOauth { provider })?,
        };

        debug!(tenant_id, %provider, "refreshing access token");

        let response = self
            .http
            .post(url)
            .timeout(REFRESH_TIMEOUT)
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", oauth.client_id.as_str()),
                ("client_secret", oauth.client_secret.expose_secret()),
                ("refresh_token", refresh_token.expose_secret()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                tenant_id,
                %provider,
                status = status.as_u16(),
                "token refresh rejected"
            );
            return Err(Error::RefreshRejected {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: RefreshResponse =
            response
                .json()
                .await
                .map_err(|source| Error::MalformedResponse {
                    message: source.to_string(),
                })?;

        let expires_at = parsed.expires_in.map(|secs| now_unix() + secs);
        let access_token = Secret::new(parsed.access_token);

        self.store
            .update(tenant_id, CredentialUpdate {
                access_token: Some(access_token.clone()),
                expires_at,
                refresh_token: parsed.refresh_token.map(Secret::new),
            })
            .await?;

        info!(tenant_id, %provider, ?expires_at, "access token refreshed");

        Ok(AccessToken {
            token: access_token,
            expires_at,
        })
    }
}

pub(crate) fn now_unix() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
