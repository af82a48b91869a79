//! Closed error taxonomy surfaced to callers. Adapter-level errors from the
//! email, oauth, and whatsapp crates are folded into it at the boundary;
//! nothing below this layer leaks through a [`DeliveryResult`].

use marquee_credentials::StoreError;

pub type Result<T> = std::result::Result<T, DeliveryError>;

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// Tenant has no provider configured. Fatal, never retried, and raised
    /// before any network call.
    #[error("no delivery provider configured for this tenant")]
    CredentialMissing,

    /// Refresh token absent or rejected. Fatal for that provider; a
    /// configured fallback may still be tried.
    #[error("credential expired and cannot be refreshed: {message}")]
    CredentialExpired { message: String },

    /// Credential fields malformed or incomplete for the chosen provider.
    #[error("transport could not be built: {message}")]
    TransportInit { message: String },

    /// Provider rejected our credentials at send time.
    #[error("provider authentication failed: {message}")]
    Auth { message: String },

    #[error("send failed: {message}")]
    Send { message: String },

    #[error("rate limited: {message}")]
    RateLimited { message: String },

    /// Caller-side problem with the request itself (empty recipients,
    /// malformed phone number, missing template parameter).
    #[error("invalid delivery request: {message}")]
    InvalidRequest { message: String },

    #[error("no whatsapp template registered under {name:?}")]
    TemplateNotFound { name: String },

    #[error("whatsapp session is not ready (state {state})")]
    SessionNotReady { state: String },

    #[error("whatsapp session exceeded its reconnect attempts")]
    MaxReconnectExceeded,

    #[error("provider call timed out")]
    Timeout,
}

impl DeliveryError {
    #[must_use]
    pub fn invalid_request(message: impl std::fmt::Display) -> Self {
        Self::InvalidRequest {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn send(message: impl std::fmt::Display) -> Self {
        Self::Send {
            message: message.to_string(),
        }
    }
}

impl From<StoreError> for DeliveryError {
    fn from(source: StoreError) -> Self {
        match source {
            StoreError::UnknownTenant { .. } => Self::CredentialMissing,
            StoreError::Backend { .. } => Self::send(source),
        }
    }
}

impl From<marquee_oauth::Error> for DeliveryError {
    fn from(source: marquee_oauth::Error) -> Self {
        use marquee_oauth::Error as Oauth;
        match source {
            Oauth::Store(store) => store.into(),
            Oauth::Http(e) if e.is_timeout() => Self::Timeout,
            Oauth::Http(e) => Self::Auth {
                message: format!("token refresh failed: {e}"),
            },
            other if other.is_unrefreshable() => Self::CredentialExpired {
                message: other.to_string(),
            },
            other => Self::Auth {
                message: other.to_string(),
            },
        }
    }
}

impl From<marquee_email::Error> for DeliveryError {
    fn from(source: marquee_email::Error) -> Self {
        use marquee_email::Error as Email;
        match source {
            Email::Config { message } => Self::TransportInit { message },
            Email::Auth { message } => Self::Auth { message },
            Email::RateLimited { message } => Self::RateLimited { message },
            Email::Send { message } => Self::Send { message },
            Email::Timeout => Self::Timeout,
            Email::InvalidMessage { message } => Self::InvalidRequest { message },
            Email::Token(token) => token.into(),
        }
    }
}

impl From<marquee_whatsapp::Error> for DeliveryError {
    fn from(source: marquee_whatsapp::Error) -> Self {
        use marquee_whatsapp::Error as Wa;
        match source {
            Wa::SessionNotReady { state, .. } => Self::SessionNotReady {
                state: state.to_string(),
            },
            Wa::MaxReconnectExceeded { .. } => Self::MaxReconnectExceeded,
            Wa::InvalidRecipient { message } => Self::InvalidRequest { message },
            Wa::RecipientNotOnChannel { .. } => Self::invalid_request(source),
            other => Self::send(other),
        }
    }
}

impl From<marquee_whatsapp_business::Error> for DeliveryError {
    fn from(source: marquee_whatsapp_business::Error) -> Self {
        use marquee_whatsapp_business::Error as Business;
        match source {
            Business::TemplateNotFound { name } => Self::TemplateNotFound { name },
            Business::MissingParameter { .. } => Self::invalid_request(source),
            Business::InvalidRecipient { message } => Self::InvalidRequest { message },
            Business::Timeout => Self::Timeout,
            Business::Rejected { .. } if source.is_auth() => Self::Auth {
                message: source.to_string(),
            },
            other => Self::send(other),
        }
    }
}
