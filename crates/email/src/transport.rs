use async_trait::async_trait;

use marquee_credentials::Provider;

use crate::{
    Result,
    message::{EmailMessage, SendReceipt},
};

/// A ready-to-use send transport for one provider.
///
/// Built per delivery attempt by the [`factory`](crate::factory); not cached
/// across sends, so a credential update is picked up by the next send.
#[async_trait]
pub trait MailTransport: std::fmt::Debug + Send + Sync {
    fn provider(&self) -> Provider;

    async fn send(&self, message: &EmailMessage) -> Result<SendReceipt>;
}
