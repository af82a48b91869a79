//! Stateless WhatsApp Business Cloud API channel.
//!
//! The session-based channel needs a live browser client; this one needs only
//! a long-lived access token and a business phone number id. Sends are
//! pre-approved template messages, one HTTPS call each, no retries. The
//! caller decides whether a failure is worth retrying over the session
//! channel.

pub mod catalog;
pub mod channel;
pub mod error;

pub use {
    catalog::{TemplateCatalog, TemplateDefinition},
    channel::{BusinessChannel, TemplateSend},
    error::{Error, Result},
};
