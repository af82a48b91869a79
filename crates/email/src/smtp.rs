//! SMTP transports (OAuth XOAUTH2 and password) built on lettre.

use std::time::Duration;

use {
    async_trait::async_trait,
    lettre::{
        AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
        message::{Mailbox, MultiPart, SinglePart, header::ContentType},
        transport::smtp::authentication::{Credentials, Mechanism},
    },
    tracing::debug,
};

use marquee_credentials::{FromIdentity, Provider};

use crate::{
    Error, Result,
    error::classify_smtp_error,
    message::{EmailMessage, SendReceipt},
    transport::MailTransport,
};

pub const GMAIL_SMTP_HOST: &str = "smtp.gmail.com";
pub const OUTLOOK_SMTP_HOST: &str = "smtp.office365.com";
pub const SUBMISSION_PORT: u16 = 587;

const SEND_TIMEOUT: Duration = Duration::from_secs(30);

/// STARTTLS SMTP transport for one tenant's mailbox.
#[derive(Debug)]
pub struct SmtpMailer {
    provider: Provider,
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// XOAUTH2 transport: the username is the mailbox address and the secret
    /// is a currently-valid access token.
    pub fn xoauth2(
        provider: Provider,
        host: &str,
        username: &str,
        access_token: &str,
        from: &FromIdentity,
    ) -> Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .map_err(Error::config)?
            .port(SUBMISSION_PORT)
            .credentials(Credentials::new(
                username.to_string(),
                access_token.to_string(),
            ))
            .authentication(vec![Mechanism::Xoauth2])
            .timeout(Some(SEND_TIMEOUT))
            .build();

        Ok(Self {
            provider,
            transport,
            from: parse_mailbox(from)?,
        })
    }

    /// Password transport (app passwords, generic SMTP logins).
    pub fn password(
        provider: Provider,
        host: &str,
        port: u16,
        username: &str,
        password: &str,
        from: &FromIdentity,
    ) -> Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .map_err(Error::config)?
            .port(port)
            .credentials(Credentials::new(
                username.to_string(),
                password.to_string(),
            ))
            .timeout(Some(SEND_TIMEOUT))
            .build();

        Ok(Self {
            provider,
            transport,
            from: parse_mailbox(from)?,
        })
    }

    fn build_message(&self, message: &EmailMessage) -> Result<Message> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(&message.subject);

        for to in &message.to {
            builder = builder.to(parse_address(to)?);
        }
        for cc in &message.cc {
            builder = builder.cc(parse_address(cc)?);
        }
        for bcc in &message.bcc {
            builder = builder.bcc(parse_address(bcc)?);
        }
        if let Some(reply_to) = &message.reply_to {
            builder = builder.reply_to(parse_address(reply_to)?);
        }

        let email = match (&message.text, &message.html) {
            (Some(text), Some(html)) => builder.multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html.clone()),
                    ),
            ),
            (None, Some(html)) => builder
                .header(ContentType::TEXT_HTML)
                .body(html.clone()),
            (Some(text), None) => builder
                .header(ContentType::TEXT_PLAIN)
                .body(text.clone()),
            (None, None) => {
                return Err(Error::invalid_message("message has neither text nor html"));
            },
        };

        email.map_err(Error::invalid_message)
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn send(&self, message: &EmailMessage) -> Result<SendReceipt> {
        let email = self.build_message(message)?;

        match self.transport.send(email).await {
            Ok(response) => {
                let message_id = response.message().next().map(ToString::to_string);
                debug!(provider = %self.provider, ?message_id, "smtp message accepted");
                Ok(SendReceipt { message_id })
            },
            Err(e) => Err(classify_smtp_error(&e)),
        }
    }
}

fn parse_mailbox(from: &FromIdentity) -> Result<Mailbox> {
    from.mailbox_string()
        .parse()
        .map_err(|e| Error::config(format!("invalid from address: {e}")))
}

fn parse_address(address: &str) -> Result<Mailbox> {
    address
        .parse()
        .map_err(|e| Error::invalid_message(format!("invalid recipient {address}: {e}")))
}
