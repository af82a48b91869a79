pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The credential lacks fields this provider requires.
    #[error("transport configuration invalid: {message}")]
    Config { message: String },

    /// Provider rejected our credentials at send time. Drives the
    /// one-refresh-one-retry rule for OAuth transports.
    #[error("provider rejected authentication: {message}")]
    Auth { message: String },

    #[error("rate limited by provider: {message}")]
    RateLimited { message: String },

    #[error("send rejected: {message}")]
    Send { message: String },

    #[error("provider call timed out")]
    Timeout,

    #[error("invalid message: {message}")]
    InvalidMessage { message: String },

    /// Could not obtain a valid access token while building the transport.
    #[error(transparent)]
    Token(#[from] marquee_oauth::Error),
}

impl Error {
    #[must_use]
    pub fn config(message: impl std::fmt::Display) -> Self {
        Self::Config {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn auth(message: impl std::fmt::Display) -> Self {
        Self::Auth {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn send(message: impl std::fmt::Display) -> Self {
        Self::Send {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn invalid_message(message: impl std::fmt::Display) -> Self {
        Self::InvalidMessage {
            message: message.to_string(),
        }
    }

    /// Authentication-shaped failure: worth one forced token refresh.
    #[must_use]
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }
}

/// Classify an SMTP send failure. Providers signal bad credentials with a
/// 535 reply or an AUTH-flavored message.
pub(crate) fn classify_smtp_error(source: &lettre::transport::smtp::Error) -> Error {
    let message = source.to_string();
    let lowered = message.to_ascii_lowercase();
    if message.contains("535") || lowered.contains("auth") {
        Error::auth(message)
    } else if lowered.contains("timed out") || lowered.contains("timeout") {
        Error::Timeout
    } else {
        Error::send(message)
    }
}

/// Classify a non-2xx HTTP API response.
pub(crate) fn classify_http_status(status: u16, body: String) -> Error {
    match status {
        401 | 403 => Error::Auth {
            message: format!("status {status}: {body}"),
        },
        429 => Error::RateLimited {
            message: format!("status {status}: {body}"),
        },
        _ => Error::Send {
            message: format!("status {status}: {body}"),
        },
    }
}

/// Map a reqwest transport failure (connect, timeout) onto our taxonomy.
pub(crate) fn classify_reqwest_error(source: reqwest::Error) -> Error {
    if source.is_timeout() {
        Error::Timeout
    } else {
        Error::send(source)
    }
}
