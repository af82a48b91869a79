//! Caller-facing facade over the email coordinator and both WhatsApp
//! channels. This is the surface the CRUD and notification layers call.

use std::{sync::Arc, time::Duration};

use {tracing::info, uuid::Uuid};

use {
    marquee_credentials::{CredentialStore, Provider},
    marquee_email::EmailMessage,
    marquee_oauth::TokenManager,
    marquee_whatsapp::{QrChallenge, SessionRegistry, SessionState},
    marquee_whatsapp_business::{BusinessChannel, TemplateSend},
};

use crate::{
    coordinator::EmailCoordinator,
    error::{DeliveryError, Result},
    result::DeliveryResult,
};

const SANDBOX_DELAY: Duration = Duration::from_millis(150);

pub struct DeliveryService {
    store: Arc<dyn CredentialStore>,
    coordinator: EmailCoordinator,
    sessions: Arc<SessionRegistry>,
    business: BusinessChannel,
}

impl DeliveryService {
    #[must_use]
    pub fn new(
        store: Arc<dyn CredentialStore>,
        tokens: Arc<TokenManager>,
        sessions: Arc<SessionRegistry>,
        business: BusinessChannel,
    ) -> Self {
        let coordinator = EmailCoordinator::new(Arc::clone(&store), tokens);
        Self {
            store,
            coordinator,
            sessions,
            business,
        }
    }

    pub async fn send_email(&self, tenant_id: &str, message: &EmailMessage) -> DeliveryResult {
        self.coordinator.send_email(tenant_id, message).await
    }

    /// Send a pre-approved template over the Business Cloud API. Stateless;
    /// failures are not retried here, callers may fall back to the session
    /// channel.
    pub async fn send_whatsapp_template(
        &self,
        tenant_id: &str,
        send: &TemplateSend,
    ) -> DeliveryResult {
        let provider = Provider::WhatsappBusiness;
        let credential = match self.store.get(tenant_id).await {
            Ok(credential) => credential,
            Err(e) => return DeliveryResult::failed(None, e.into()),
        };

        if credential.sandbox {
            // Template lookup still applies so demo tenants catch typos.
            if let Err(e) = self.business.catalog().lookup(&send.template) {
                return DeliveryResult::failed(Some(provider), e.into());
            }
            return DeliveryResult::delivered(provider, Some(sandbox_send().await));
        }

        let Some(business) = credential.whatsapp_business.as_ref() else {
            return DeliveryResult::failed(None, DeliveryError::CredentialMissing);
        };

        match self.business.send_template(business, send).await {
            Ok(message_id) => {
                info!(tenant_id, template = %send.template, "whatsapp template sent");
                DeliveryResult::delivered(provider, Some(message_id))
            },
            Err(e) => DeliveryResult::failed(Some(provider), e.into()),
        }
    }

    /// Send free-form text over the tenant's session channel. Requires a
    /// session in state `ready`.
    pub async fn send_whatsapp_message(
        &self,
        tenant_id: &str,
        recipient: &str,
        text: &str,
    ) -> DeliveryResult {
        let provider = Provider::WhatsappSession;
        let Some(session) = self.sessions.get(tenant_id).await else {
            return DeliveryResult::failed(
                Some(provider),
                DeliveryError::SessionNotReady {
                    state: SessionState::Uninitialized.to_string(),
                },
            );
        };

        match session.send_text(recipient, text).await {
            Ok(message_id) => DeliveryResult::delivered(provider, Some(message_id)),
            Err(e) => DeliveryResult::failed(Some(provider), e.into()),
        }
    }

    pub async fn initialize_whatsapp(&self, tenant_id: &str) -> Result<()> {
        let session = self.sessions.get_or_create(tenant_id).await;
        session.initialize().await?;
        Ok(())
    }

    /// Pending QR challenge, or `None` when there is no session, no pending
    /// challenge, or the challenge has expired.
    pub async fn whatsapp_qr_code(&self, tenant_id: &str) -> Option<QrChallenge> {
        self.sessions
            .get(tenant_id)
            .await
            .and_then(|session| session.qr_code())
    }

    pub async fn whatsapp_status(&self, tenant_id: &str) -> SessionState {
        match self.sessions.get(tenant_id).await {
            Some(session) => session.status(),
            None => SessionState::Uninitialized,
        }
    }

    pub async fn logout_whatsapp(&self, tenant_id: &str) -> Result<()> {
        if let Some(session) = self.sessions.get(tenant_id).await {
            session.logout().await?;
        }
        self.sessions.remove(tenant_id).await;
        Ok(())
    }
}

async fn sandbox_send() -> String {
    tokio::time::sleep(SANDBOX_DELAY).await;
    format!("sandbox-{}", Uuid::new_v4())
}
