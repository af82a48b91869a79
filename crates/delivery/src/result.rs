use {marquee_credentials::Provider, serde::Serialize};

use crate::error::DeliveryError;

/// Outcome of one delivery attempt, fallback included. Failures come back
/// through this struct, not as errors across the component boundary.
#[derive(Debug, Serialize)]
pub struct DeliveryResult {
    pub success: bool,
    /// Provider that handled (or last attempted) the send.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<Provider>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "error_string")]
    pub error: Option<DeliveryError>,
}

impl DeliveryResult {
    #[must_use]
    pub fn delivered(provider: Provider, message_id: Option<String>) -> Self {
        Self {
            success: true,
            provider: Some(provider),
            message_id,
            error: None,
        }
    }

    #[must_use]
    pub fn failed(provider: Option<Provider>, error: DeliveryError) -> Self {
        Self {
            success: false,
            provider,
            message_id: None,
            error: Some(error),
        }
    }
}

#[allow(clippy::ref_option)]
fn error_string<S: serde::Serializer>(
    error: &Option<DeliveryError>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match error {
        Some(e) => serializer.serialize_some(&e.to_string()),
        None => serializer.serialize_none(),
    }
}
