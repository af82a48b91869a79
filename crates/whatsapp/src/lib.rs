//! Per-tenant WhatsApp Web sessions for the marquee delivery core.
//!
//! Each tenant gets at most one long-lived browser-automated WhatsApp client,
//! driven through an opaque [`SessionTransport`]. The [`Session`] owns the
//! connection state machine (QR issuance, authentication handshake,
//! disconnect detection, bounded reconnection) and the [`SessionRegistry`]
//! maps tenant ids to live sessions with synchronized creation and teardown.
//! The production transport talks to a local browser-automation bridge over
//! a websocket; tests script their own transport.

pub mod bridge;
pub mod error;
pub mod normalize;
pub mod registry;
pub mod session;
pub mod state;
pub mod transport;

pub use {
    bridge::{BridgeTransport, DEFAULT_BRIDGE_PORT},
    error::{Error, Result},
    normalize::normalize_jid,
    registry::SessionRegistry,
    session::Session,
    state::{MAX_RECONNECT_ATTEMPTS, QR_TTL_SECS, QrChallenge, SessionSnapshot, SessionState},
    transport::{SessionTransport, TransportEvent, TransportHandle},
};
