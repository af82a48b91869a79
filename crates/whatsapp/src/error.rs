use crate::state::SessionState;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("whatsapp session for tenant {tenant_id} is not ready (state {state})")]
    SessionNotReady {
        tenant_id: String,
        state: SessionState,
    },

    #[error("whatsapp session for tenant {tenant_id} exceeded reconnect attempts")]
    MaxReconnectExceeded { tenant_id: String },

    #[error("invalid recipient number: {message}")]
    InvalidRecipient { message: String },

    #[error("recipient {recipient} is not registered on whatsapp")]
    RecipientNotOnChannel { recipient: String },

    #[error("session transport failure: {context}: {source}")]
    Transport {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("{message}")]
    Message { message: String },

    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
}

impl Error {
    #[must_use]
    pub fn invalid_recipient(message: impl std::fmt::Display) -> Self {
        Self::InvalidRecipient {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn transport(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Transport {
            context: context.into(),
            source: Box::new(source),
        }
    }
}
