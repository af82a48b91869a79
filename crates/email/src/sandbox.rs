//! Simulated transport for sandbox tenants: no network, just latency.

use std::time::Duration;

use {async_trait::async_trait, tracing::info};

use marquee_credentials::Provider;

use crate::{
    Result,
    message::{EmailMessage, SendReceipt},
    transport::MailTransport,
};

const SIMULATED_LATENCY: Duration = Duration::from_millis(150);

#[derive(Debug)]
pub struct SandboxTransport {
    provider: Provider,
}

impl SandboxTransport {
    #[must_use]
    pub fn new(provider: Provider) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl MailTransport for SandboxTransport {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn send(&self, message: &EmailMessage) -> Result<SendReceipt> {
        tokio::time::sleep(SIMULATED_LATENCY).await;
        let message_id = format!("sandbox-{}", uuid::Uuid::new_v4());
        info!(
            provider = %self.provider,
            recipients = message.to.len(),
            message_id,
            "sandbox send simulated"
        );
        Ok(SendReceipt {
            message_id: Some(message_id),
        })
    }
}
