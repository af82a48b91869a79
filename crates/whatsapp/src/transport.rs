use {async_trait::async_trait, tokio::sync::mpsc};

use crate::Result;

/// Events surfaced by the underlying WhatsApp client.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// A new QR challenge was issued; replaces any previous one.
    Qr { payload: String },
    /// QR scanned, handshake in progress.
    Authenticated,
    /// Session is fully usable.
    Ready { phone_number: Option<String> },
    /// Transport-level disconnect (network loss, remote logout, invalidated
    /// session).
    Disconnected { reason: String },
    /// Remote side confirmed a logout.
    LoggedOut,
}

/// Receiver for the event stream of one connection.
pub type EventReceiver = mpsc::Receiver<TransportEvent>;

/// Connection factory for the opaque WhatsApp client. One call per
/// (re)connection attempt; the returned handle is valid until a
/// `Disconnected` event arrives on the stream.
#[async_trait]
pub trait SessionTransport: Send + Sync {
    async fn connect(&self, tenant_id: &str) -> Result<(EventReceiver, std::sync::Arc<dyn TransportHandle>)>;
}

/// Commands against a live connection.
#[async_trait]
pub trait TransportHandle: Send + Sync {
    /// Send a text message; returns the provider message id.
    async fn send_text(&self, jid: &str, text: &str) -> Result<String>;

    /// Send media by URL with an optional caption; returns the message id.
    async fn send_media(&self, jid: &str, url: &str, caption: &str) -> Result<String>;

    /// Whether the JID is a registered account on the channel.
    async fn is_registered(&self, jid: &str) -> Result<bool>;

    /// Ask the remote client to log out and drop its auth state.
    async fn logout(&self) -> Result<()>;
}
