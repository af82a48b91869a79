//! Email transports for the marquee delivery core.
//!
//! One [`MailTransport`] implementation per provider: OAuth and password
//! SMTP via lettre, SendGrid and Resend over their HTTPS APIs, plus a
//! sandbox transport that simulates delivery for demo tenants. The
//! [`factory`] module builds the right transport from a tenant's
//! [`ChannelCredential`](marquee_credentials::ChannelCredential), pulling
//! fresh OAuth tokens from the token manager where needed.

pub mod error;
pub mod factory;
pub mod message;
pub mod resend;
pub mod sandbox;
pub mod sendgrid;
pub mod smtp;
pub mod transport;

pub use {
    error::{Error, Result},
    factory::build_transport,
    message::{EmailMessage, SendReceipt},
    transport::MailTransport,
};
