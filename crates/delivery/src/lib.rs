//! Delivery core for the marquee event platform: one facade that routes a
//! tenant's outbound messages to the provider they configured.
//!
//! Email goes through the [`EmailCoordinator`]: primary transport, one
//! forced token refresh plus one retry on an auth-shaped failure, then at
//! most one fallback provider. WhatsApp has two channels: the stateless
//! Business Cloud API for approved templates and the session-based channel
//! for free-form text. All failures come back as a structured
//! [`DeliveryResult`]; nothing here panics or leaks adapter errors.

pub mod coordinator;
pub mod error;
pub mod result;
pub mod service;

pub use {
    coordinator::{EmailCoordinator, FactoryBuilder, TransportBuilder},
    error::{DeliveryError, Result},
    result::DeliveryResult,
    service::DeliveryService,
};
