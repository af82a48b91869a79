use std::collections::HashMap;

use {async_trait::async_trait, tokio::sync::RwLock, tracing::debug};

use crate::model::{ChannelCredential, CredentialUpdate};

/// Errors surfaced by credential store implementations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unknown tenant: {tenant_id}")]
    UnknownTenant { tenant_id: String },

    #[error("credential store failure: {context}: {source}")]
    Backend {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl StoreError {
    #[must_use]
    pub fn unknown_tenant(tenant_id: impl Into<String>) -> Self {
        Self::UnknownTenant {
            tenant_id: tenant_id.into(),
        }
    }

    #[must_use]
    pub fn backend(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Backend {
            context: context.into(),
            source: Box::new(source),
        }
    }
}

/// Read/write access to per-tenant channel credentials.
///
/// The delivery core reads whole credentials and writes back only partial
/// token-refresh results. The application supplies the persistent
/// implementation; [`MemoryCredentialStore`] backs tests and demos.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get(&self, tenant_id: &str) -> crate::Result<ChannelCredential>;

    /// Apply a partial update to a tenant's OAuth material.
    async fn update(&self, tenant_id: &str, update: CredentialUpdate) -> crate::Result<()>;
}

/// In-memory credential store.
#[derive(Default)]
pub struct MemoryCredentialStore {
    inner: RwLock<HashMap<String, ChannelCredential>>,
}

impl MemoryCredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, credential: ChannelCredential) {
        let mut inner = self.inner.write().await;
        inner.insert(credential.tenant_id.clone(), credential);
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self, tenant_id: &str) -> crate::Result<ChannelCredential> {
        let inner = self.inner.read().await;
        inner
            .get(tenant_id)
            .cloned()
            .ok_or_else(|| StoreError::unknown_tenant(tenant_id))
    }

    async fn update(&self, tenant_id: &str, update: CredentialUpdate) -> crate::Result<()> {
        if update.is_empty() {
            return Ok(());
        }

        let mut inner = self.inner.write().await;
        let credential = inner
            .get_mut(tenant_id)
            .ok_or_else(|| StoreError::unknown_tenant(tenant_id))?;

        let Some(oauth) = credential.oauth.as_mut() else {
            return Err(StoreError::backend(
                format!("tenant {tenant_id} has no oauth credential to update"),
                std::io::Error::other("missing oauth section"),
            ));
        };

        if let Some(token) = update.access_token {
            oauth.access_token = Some(token);
        }
        if let Some(expires_at) = update.expires_at {
            oauth.expires_at = Some(expires_at);
        }
        if let Some(refresh) = update.refresh_token {
            oauth.refresh_token = Some(refresh);
        }

        debug!(tenant_id, "credential token fields updated");
        Ok(())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use secrecy::{ExposeSecret, Secret};

    use {
        super::*,
        crate::model::{OauthCredential, Provider},
    };

    fn oauth_credential(tenant_id: &str) -> ChannelCredential {
        ChannelCredential {
            provider: Some(Provider::GmailOauth),
            oauth: Some(OauthCredential {
                client_id: "client".into(),
                client_secret: Secret::new("secret".into()),
                refresh_token: Some(Secret::new("refresh-old".into())),
                access_token: Some(Secret::new("access-old".into())),
                expires_at: Some(100),
            }),
            ..ChannelCredential::empty(tenant_id)
        }
    }

    #[tokio::test]
    async fn get_unknown_tenant_fails() {
        let store = MemoryCredentialStore::new();
        let err = store.get("missing").await.unwrap_err();
        assert!(matches!(err, StoreError::UnknownTenant { .. }));
    }

    #[tokio::test]
    async fn update_persists_token_fields() {
        let store = MemoryCredentialStore::new();
        store.insert(oauth_credential("w1")).await;

        store
            .update("w1", CredentialUpdate {
                access_token: Some(Secret::new("access-new".into())),
                expires_at: Some(9_999),
                refresh_token: None,
            })
            .await
            .unwrap();

        let cred = store.get("w1").await.unwrap();
        let oauth = cred.oauth.unwrap();
        assert_eq!(oauth.access_token.unwrap().expose_secret(), "access-new");
        assert_eq!(oauth.expires_at, Some(9_999));
        // Absent refresh token leaves the stored one in place.
        assert_eq!(oauth.refresh_token.unwrap().expose_secret(), "refresh-old");
    }

    #[tokio::test]
    async fn update_rotates_refresh_token_when_present() {
        let store = MemoryCredentialStore::new();
        store.insert(oauth_credential("w1")).await;

        store
            .update("w1", CredentialUpdate {
                access_token: Some(Secret::new("access-new".into())),
                expires_at: Some(9_999),
                refresh_token: Some(Secret::new("refresh-new".into())),
            })
            .await
            .unwrap();

        let cred = store.get("w1").await.unwrap();
        let oauth = cred.oauth.unwrap();
        assert_eq!(oauth.refresh_token.unwrap().expose_secret(), "refresh-new");
    }
}
