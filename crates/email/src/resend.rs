//! Resend mail transport.

use std::time::Duration;

use {
    async_trait::async_trait,
    secrecy::{ExposeSecret, Secret},
    serde::Deserialize,
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

pub const DEFAULT_RESEND_BASE: &str = "https://api.resend.com";

const SEND_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct ResendResponse {
    id: String,
}

#[derive(Debug)]
pub struct ResendTransport {
    http: reqwest::Client,
    base_url: String,
    api_key: Secret<String>,
    from: FromIdentity,
}

impl ResendTransport {
    #[must_use]
    pub fn new(api_key: Secret<String>, from: FromIdentity) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: DEFAULT_RESEND_BASE.to_string(),
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
        let mut payload = json!({
            "from": self.from.mailbox_string(),
            "to": message.to,
            "subject": message.subject,
        });
        if let Some(html) = &message.html {
            payload["html"] = json!(html);
        }
        if let Some(text) = &message.text {
            payload["text"] = json!(text);
        }
        if let Some(reply_to) = &message.reply_to {
            payload["reply_to"] = json!(reply_to);
        }
        if !message.cc.is_empty() {
            payload["cc"] = json!(message.cc);
        }
        if !message.bcc.is_empty() {
            payload["bcc"] = json!(message.bcc);
        }
        payload
    }
}

#[async_trait]
impl MailTransport for ResendTransport {
    fn provider(&self) -> Provider {
        Provider::Resend
    }

    async fn send(&self, message: &EmailMessage) -> Result<SendReceipt> {
        let response = self
            .http
            .post(format!("{}/emails", self.base_url))
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

        let parsed: Option<ResendResponse> = response.json().await.ok();
        let message_id = parsed.map(|r| r.id);
        debug!(?message_id, "resend message accepted");
        Ok(SendReceipt { message_id })
    }
}
