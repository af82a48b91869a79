pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no whatsapp template registered under {name:?}")]
    TemplateNotFound { name: String },

    #[error("template {template:?} requires parameter {name:?}")]
    MissingParameter { template: String, name: String },

    #[error("invalid recipient number: {message}")]
    InvalidRecipient { message: String },

    #[error("cloud api rejected the send ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("cloud api request timed out")]
    Timeout,

    #[error("cloud api request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    #[must_use]
    pub fn template_not_found(name: impl Into<String>) -> Self {
        Self::TemplateNotFound { name: name.into() }
    }

    #[must_use]
    pub fn invalid_recipient(message: impl std::fmt::Display) -> Self {
        Self::InvalidRecipient {
            message: message.to_string(),
        }
    }

    /// Whether the failure looks like an expired or revoked access token.
    #[must_use]
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Rejected { status, .. } if *status == 401 || *status == 403)
    }
}
