//! Token lifecycle management for OAuth-backed mailbox providers.
//!
//! [`TokenManager`] hands out currently-valid access tokens for a tenant's
//! Gmail or Outlook credential, transparently performing a refresh-token
//! grant against the provider's token endpoint when the cached token is
//! missing or near expiry, and persisting the result back to the credential
//! store. Refreshes for the same (tenant, provider) pair are serialized so
//! concurrent sends never race to persist two different tokens.

pub mod endpoints;
pub mod error;
pub mod manager;

pub use {
    endpoints::token_endpoint,
    error::{Error, Result},
    manager::{AccessToken, DEFAULT_SAFETY_MARGIN_SECS, TokenManager},
};
