//! Per-tenant channel credentials for the marquee delivery core.
//!
//! Each tenant (one wedding event) owns a single [`ChannelCredential`] that
//! selects a primary provider, an optional fallback provider, and the auth
//! material each provider needs. The delivery crates read credentials through
//! the [`CredentialStore`] trait and write back only token-refresh results
//! via [`CredentialUpdate`]; the application's persistence layer provides the
//! real implementation.

pub mod model;
pub mod store;

pub use {
    model::{
        BusinessCredential, ChannelCredential, CredentialUpdate, FromIdentity, OauthCredential,
        Provider, SmtpCredential,
    },
    store::{CredentialStore, MemoryCredentialStore, StoreError},
};

pub type Result<T> = std::result::Result<T, StoreError>;
