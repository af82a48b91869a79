use std::{collections::HashMap, time::Duration};

use {
    secrecy::ExposeSecret,
    serde::Deserialize,
    serde_json::json,
    tracing::{debug, warn},
};

use marquee_credentials::BusinessCredential;

use crate::{Error, Result, catalog::TemplateCatalog};

pub const DEFAULT_GRAPH_BASE: &str = "https://graph.facebook.com";
pub const GRAPH_API_VERSION: &str = "v18.0";

const SEND_TIMEOUT: Duration = Duration::from_secs(30);
const MIN_RECIPIENT_DIGITS: usize = 8;

/// One template send. `base_params` carry context the caller always has
/// (guest name, event name); `params` are per-send overrides and win on
/// conflict.
#[derive(Debug, Clone, Default)]
pub struct TemplateSend {
    pub template: String,
    pub recipient: String,
    pub base_params: HashMap<String, String>,
    pub params: HashMap<String, String>,
}

#[derive(Deserialize)]
struct SendResponse {
    #[serde(default)]
    messages: Vec<SentMessage>,
}

#[derive(Deserialize)]
struct SentMessage {
    id: String,
}

#[derive(Deserialize)]
struct ApiError {
    error: ApiErrorBody,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: String,
}

pub struct BusinessChannel {
    http: reqwest::Client,
    base_url: String,
    catalog: TemplateCatalog,
}

impl BusinessChannel {
    #[must_use]
    pub fn new(catalog: TemplateCatalog) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: DEFAULT_GRAPH_BASE.to_string(),
            catalog,
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[must_use]
    pub fn catalog(&self) -> &TemplateCatalog {
        &self.catalog
    }

    /// Send one template message. Template lookup and parameter resolution
    /// happen before any network call; the HTTPS request is made at most
    /// once, with no retry.
    pub async fn send_template(
        &self,
        credential: &BusinessCredential,
        send: &TemplateSend,
    ) -> Result<String> {
        let template = self.catalog.lookup(&send.template)?;
        let params = template.resolve_params(&send.base_params, &send.params)?;
        let to = recipient_digits(&send.recipient)?;

        let components = if params.is_empty() {
            json!([])
        } else {
            json!([{
                "type": "body",
                "parameters": params
                    .iter()
                    .map(|value| json!({ "type": "text", "text": value }))
                    .collect::<Vec<_>>(),
            }])
        };

        let payload = json!({
            "messaging_product": "whatsapp",
            "recipient_type": "individual",
            "to": to,
            "type": "template",
            "template": {
                "name": template.name,
                "language": { "code": template.language },
                "components": components,
            },
        });

        let url = format!(
            "{}/{}/{}/messages",
            self.base_url, GRAPH_API_VERSION, credential.phone_number_id
        );
        let response = self
            .http
            .post(url)
            .timeout(SEND_TIMEOUT)
            .bearer_auth(credential.access_token.expose_secret())
            .json(&payload)
            .send()
            .await
            .map_err(|e| if e.is_timeout() { Error::Timeout } else { e.into() })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiError>(&body)
                .map_or(body, |api| api.error.message);
            warn!(status = status.as_u16(), message, "cloud api send rejected");
            return Err(Error::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: SendResponse = response.json().await?;
        let message_id = parsed
            .messages
            .into_iter()
            .next()
            .map_or_else(String::new, |m| m.id);
        debug!(template = %template.name, message_id, "template message accepted");
        Ok(message_id)
    }
}

fn recipient_digits(recipient: &str) -> Result<String> {
    let digits: String = recipient.chars().filter(char::is_ascii_digit).collect();
    if digits.len() < MIN_RECIPIENT_DIGITS {
        return Err(Error::invalid_recipient(format!(
            "{recipient:?} has fewer than {MIN_RECIPIENT_DIGITS} digits"
        )));
    }
    Ok(digits)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recipient_keeps_digits_only() {
        assert_eq!(
            recipient_digits("+49 (171) 555-0123").unwrap(),
            "491715550123"
        );
        assert!(recipient_digits("12345").is_err());
    }
}
