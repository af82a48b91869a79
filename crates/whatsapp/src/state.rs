use std::time::Duration;

use serde::Serialize;

/// A QR challenge is scannable for this long after issuance.
pub const QR_TTL_SECS: u64 = 45;

/// Automatic reconnection gives up after this many attempts.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;

const BASE_RECONNECT_DELAY_MS: u64 = 1_000;
const MAX_RECONNECT_DELAY_MS: u64 = 30_000;

/// Connection states of one tenant's WhatsApp session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Uninitialized,
    Connecting,
    QrPending,
    Authenticated,
    Ready,
    Disconnected,
    Reconnecting,
    /// Reconnect attempts exhausted; requires a fresh `initialize`.
    Failed,
}

impl SessionState {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Connecting => "connecting",
            Self::QrPending => "qr_pending",
            Self::Authenticated => "authenticated",
            Self::Ready => "ready",
            Self::Disconnected => "disconnected",
            Self::Reconnecting => "reconnecting",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pending QR challenge. Each new challenge replaces the previous one and
/// restarts the TTL.
#[derive(Debug, Clone, Serialize)]
pub struct QrChallenge {
    pub payload: String,
    /// Unix timestamp after which the code can no longer be scanned.
    pub expires_at: u64,
}

impl QrChallenge {
    #[must_use]
    pub fn issue(payload: impl Into<String>, now: u64) -> Self {
        Self {
            payload: payload.into(),
            expires_at: now + QR_TTL_SECS,
        }
    }

    #[must_use]
    pub fn is_expired(&self, now: u64) -> bool {
        now >= self.expires_at
    }
}

/// Observable state of one session, returned by status polls.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub qr: Option<QrChallenge>,
    pub reconnect_attempts: u32,
    pub last_error: Option<String>,
    /// Authenticated phone number once the handshake completes.
    pub phone_number: Option<String>,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            state: SessionState::Uninitialized,
            qr: None,
            reconnect_attempts: 0,
            last_error: None,
            phone_number: None,
        }
    }
}

/// Backoff before reconnect attempt `attempt` (zero-based):
/// `min(2^attempt * 1000ms, 30s)`.
#[must_use]
pub fn reconnect_delay(attempt: u32) -> Duration {
    let millis = BASE_RECONNECT_DELAY_MS
        .saturating_mul(2u64.saturating_pow(attempt))
        .min(MAX_RECONNECT_DELAY_MS);
    Duration::from_millis(millis)
}

pub(crate) fn now_unix() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
