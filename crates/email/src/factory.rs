//! Builds a provider-specific [`MailTransport`] from a tenant credential.

use secrecy::ExposeSecret;

use {
    marquee_credentials::{ChannelCredential, FromIdentity, Provider},
    marquee_oauth::TokenManager,
};

use crate::{
    Error, Result,
    resend::ResendTransport,
    sandbox::SandboxTransport,
    sendgrid::SendgridTransport,
    smtp::{GMAIL_SMTP_HOST, OUTLOOK_SMTP_HOST, SmtpMailer},
    transport::MailTransport,
};

/// Build the send transport for `provider` from the tenant's credential.
///
/// OAuth providers pull a currently-valid access token from the token
/// manager, which may itself perform (and persist) a refresh. Missing
/// configuration fails here with `Config`, before any send attempt.
pub async fn build_transport(
    credential: &ChannelCredential,
    provider: Provider,
    tokens: &TokenManager,
) -> Result<Box<dyn MailTransport>> {
    if credential.sandbox {
        return Ok(Box::new(SandboxTransport::new(provider)));
    }

    match provider {
        Provider::GmailOauth => {
            oauth_smtp(credential, provider, GMAIL_SMTP_HOST, tokens).await
        },
        Provider::OutlookOauth => {
            oauth_smtp(credential, provider, OUTLOOK_SMTP_HOST, tokens).await
        },
        Provider::GmailPassword => {
            let from = require_from(credential)?;
            let smtp = credential
                .smtp
                .as_ref()
                .ok_or_else(|| Error::config("gmail password provider needs smtp credentials"))?;
            Ok(Box::new(SmtpMailer::password(
                provider,
                GMAIL_SMTP_HOST,
                smtp.port,
                &smtp.username,
                smtp.password.expose_secret(),
                from,
            )?))
        },
        Provider::Smtp => {
            let from = require_from(credential)?;
            let smtp = credential
                .smtp
                .as_ref()
                .ok_or_else(|| Error::config("smtp provider needs host and login"))?;
            Ok(Box::new(SmtpMailer::password(
                provider,
                &smtp.host,
                smtp.port,
                &smtp.username,
                smtp.password.expose_secret(),
                from,
            )?))
        },
        Provider::Sendgrid => {
            let from = require_from(credential)?;
            let api_key = credential
                .api_key
                .clone()
                .ok_or_else(|| Error::config("sendgrid provider needs an api key"))?;
            Ok(Box::new(SendgridTransport::new(api_key, from.clone())))
        },
        Provider::Resend => {
            let from = require_from(credential)?;
            let api_key = credential
                .api_key
                .clone()
                .ok_or_else(|| Error::config("resend provider needs an api key"))?;
            Ok(Box::new(ResendTransport::new(api_key, from.clone())))
        },
        Provider::WhatsappBusiness | Provider::WhatsappSession => Err(Error::config(format!(
            "{provider} is not an email provider"
        ))),
    }
}

async fn oauth_smtp(
    credential: &ChannelCredential,
    provider: Provider,
    host: &str,
    tokens: &TokenManager,
) -> Result<Box<dyn MailTransport>> {
    let from = require_from(credential)?;
    let access = tokens
        .valid_access_token(&credential.tenant_id, provider)
        .await?;
    Ok(Box::new(SmtpMailer::xoauth2(
        provider,
        host,
        &from.address,
        access.token.expose_secret(),
        from,
    )?))
}

fn require_from(credential: &ChannelCredential) -> Result<&FromIdentity> {
    credential
        .from
        .as_ref()
        .ok_or_else(|| Error::config("credential has no from identity"))
}
