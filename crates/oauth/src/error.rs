use marquee_credentials::Provider;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("tenant {tenant_id} has no oauth credential configured")]
    MissingOauthConfig { tenant_id: String },

    #[error("tenant {tenant_id} has no refresh token for {provider}")]
    MissingRefreshToken {
        tenant_id: String,
        provider: Provider,
    },

    #[error("provider {provider} does not use oauth tokens")]
    NotOauth { provider: Provider },

    #[error("token endpoint rejected refresh (status {status}): {body}")]
    RefreshRejected { status: u16, body: String },

    #[error("token endpoint returned malformed response: {message}")]
    MalformedResponse { message: String },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Store(#[from] marquee_credentials::StoreError),
}

impl Error {
    /// True when the credential cannot be made valid without operator action
    /// (re-linking the mailbox); the caller should give up on this provider
    /// and consider its fallback.
    #[must_use]
    pub fn is_unrefreshable(&self) -> bool {
        matches!(
            self,
            Self::MissingOauthConfig { .. }
                | Self::MissingRefreshToken { .. }
                | Self::RefreshRejected { .. }
        )
    }
}
