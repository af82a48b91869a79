//! Email send orchestration: primary leg, one refresh+retry on an
//! auth-shaped failure, then at most one fallback leg.

use std::sync::Arc;

use {async_trait::async_trait, tracing::{info, warn}};

use {
    marquee_credentials::{ChannelCredential, CredentialStore, Provider},
    marquee_email::{EmailMessage, MailTransport, build_transport},
    marquee_oauth::TokenManager,
};

use crate::{
    error::{DeliveryError, Result},
    result::DeliveryResult,
};

/// Seam between the coordinator and the provider adapters. Production uses
/// [`FactoryBuilder`]; tests script their own transports.
#[async_trait]
pub trait TransportBuilder: Send + Sync {
    async fn build(
        &self,
        credential: &ChannelCredential,
        provider: Provider,
        tokens: &TokenManager,
    ) -> marquee_email::Result<Box<dyn MailTransport>>;
}

/// Delegates to the email crate's transport factory.
pub struct FactoryBuilder;

#[async_trait]
impl TransportBuilder for FactoryBuilder {
    async fn build(
        &self,
        credential: &ChannelCredential,
        provider: Provider,
        tokens: &TokenManager,
    ) -> marquee_email::Result<Box<dyn MailTransport>> {
        build_transport(credential, provider, tokens).await
    }
}

pub struct EmailCoordinator {
    store: Arc<dyn CredentialStore>,
    tokens: Arc<TokenManager>,
    builder: Arc<dyn TransportBuilder>,
}

impl EmailCoordinator {
    #[must_use]
    pub fn new(store: Arc<dyn CredentialStore>, tokens: Arc<TokenManager>) -> Self {
        Self::with_builder(store, tokens, Arc::new(FactoryBuilder))
    }

    #[must_use]
    pub fn with_builder(
        store: Arc<dyn CredentialStore>,
        tokens: Arc<TokenManager>,
        builder: Arc<dyn TransportBuilder>,
    ) -> Self {
        Self {
            store,
            tokens,
            builder,
        }
    }

    /// Send one email for the tenant. Never returns an error: every failure
    /// is folded into the [`DeliveryResult`].
    pub async fn send_email(&self, tenant_id: &str, message: &EmailMessage) -> DeliveryResult {
        if message.to.is_empty() {
            return DeliveryResult::failed(
                None,
                DeliveryError::invalid_request("recipient list is empty"),
            );
        }

        let credential = match self.store.get(tenant_id).await {
            Ok(credential) => credential,
            Err(e) => return DeliveryResult::failed(None, e.into()),
        };
        let Some(primary) = credential.provider else {
            return DeliveryResult::failed(None, DeliveryError::CredentialMissing);
        };

        match self.send_leg(&credential, primary, message).await {
            Ok(message_id) => return DeliveryResult::delivered(primary, message_id),
            Err(primary_err) => {
                let fallback = credential
                    .fallback_provider
                    .filter(|fallback| *fallback != primary && fallback.is_email());
                let Some(fallback) = fallback else {
                    return DeliveryResult::failed(Some(primary), primary_err);
                };

                warn!(
                    tenant_id,
                    primary = %primary,
                    fallback = %fallback,
                    error = %primary_err,
                    "primary transport failed, trying fallback"
                );

                // Re-read so a credential fixed mid-flight is honored.
                let credential = match self.store.get(tenant_id).await {
                    Ok(credential) => credential,
                    Err(e) => return DeliveryResult::failed(Some(fallback), e.into()),
                };
                match self.send_leg(&credential, fallback, message).await {
                    Ok(message_id) => DeliveryResult::delivered(fallback, message_id),
                    Err(fallback_err) => DeliveryResult::failed(Some(fallback), fallback_err),
                }
            },
        }
    }

    /// One provider leg: build, send, and on an auth-shaped failure of an
    /// OAuth provider force exactly one token refresh and retry once.
    async fn send_leg(
        &self,
        credential: &ChannelCredential,
        provider: Provider,
        message: &EmailMessage,
    ) -> Result<Option<String>> {
        let transport = self
            .builder
            .build(credential, provider, &self.tokens)
            .await?;

        match transport.send(message).await {
            Ok(receipt) => {
                info!(
                    tenant_id = %credential.tenant_id,
                    provider = %provider,
                    message_id = ?receipt.message_id,
                    "email sent"
                );
                Ok(receipt.message_id)
            },
            Err(e) if e.is_auth() && provider.is_oauth() && !credential.sandbox => {
                warn!(
                    tenant_id = %credential.tenant_id,
                    provider = %provider,
                    error = %e,
                    "auth failure, forcing token refresh and retrying once"
                );
                self.tokens
                    .force_refresh(&credential.tenant_id, provider)
                    .await?;

                // The refreshed token was persisted; rebuild from the stored
                // credential so the retry uses it.
                let credential = self.store.get(&credential.tenant_id).await?;
                let transport = self
                    .builder
                    .build(&credential, provider, &self.tokens)
                    .await?;
                let receipt = transport.send(message).await?;
                Ok(receipt.message_id)
            },
            Err(e) => Err(e.into()),
        }
    }
}
