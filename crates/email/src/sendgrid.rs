//! SendGrid v3 mail transport.

use std::time::Duration;

use {
    async_trait::async_trait,
    secrecy::{ExposeSecret, Secret},
    serde_json::json,
    tracing::debug,
};

use marquee_credentials::{FromIdentity, Provider};

use crate::{
    Result,
    error::{classify_http_status, classify_reqwest_error},
    message::{EmailMessage, SendReceipt},
    transport::MailTransport,
};

pub const DEFAULT_SENDGRID_BASE: &str = "https://api.sendgrid.com";

const SEND_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug)]
pub struct SendgridTransport {
    http: reqwest::Client,
    base_url: String,
    api_key: Secret<String>,
    from: FromIdentity,
}

impl SendgridTransport {
    #[must_use]
    pub fn new(api_key: Secret<String>, from: FromIdentity) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: DEFAULT_SENDGRID_BASE.to_string(),
            api_key,
            from,
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn payload(&self, message: &EmailMessage) -> serde_json::Value {
        let recipient = |addr: &String| json!({ "email": addr });
        let mut personalization = json!({
            "to": message.to.iter().map(recipient).collect::<Vec<_>>(),
        });
        if !message.cc.is_empty() {
            personalization["cc"] = json!(message.cc.iter().map(recipient).collect::<Vec<_>>());
        }
        if !message.bcc.is_empty() {
            personalization["bcc"] = json!(message.bcc.iter().map(recipient).collect::<Vec<_>>());
        }

        let mut content = Vec::new();
        if let Some(text) = &message.text {
            content.push(json!({ "type": "text/plain", "value": text }));
        }
        if let Some(html) = &message.html {
            content.push(json!({ "type": "text/html", "value": html }));
        }

        let mut payload = json!({
            "personalizations": [personalization],
            "from": { "email": self.from.address, "name": self.from.name },
            "subject": message.subject,
            "content": content,
        });
        if let Some(reply_to) = &message.reply_to {
            payload["reply_to"] = json!({ "email": reply_to });
        }
        payload
    }
}

#[async_trait]
impl MailTransport for SendgridTransport {
    fn provider(&self) -> Provider {
        Provider::Sendgrid
    }

    async fn send(&self, message: &EmailMessage) -> Result<SendReceipt> {
        let response = self
            .http
            .post(format!("{}/v3/mail/send", self.base_url))
            .timeout(SEND_TIMEOUT)
            .bearer_auth(self.api_key.expose_secret())
            .json(&self.payload(message))
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_http_status(status.as_u16(), body));
        }

        // SendGrid replies 202 with the id in a header, not the body.
        let message_id = response
            .headers()
            .get("x-message-id")
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string);
        debug!(?message_id, "sendgrid message accepted");
        Ok(SendReceipt { message_id })
    }
}
