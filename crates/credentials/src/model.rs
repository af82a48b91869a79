use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Delivery providers a tenant can select as primary or fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    /// Gmail mailbox over SMTP with an XOAUTH2 access token.
    GmailOauth,
    /// Gmail mailbox over SMTP with an app password.
    GmailPassword,
    /// Outlook / Microsoft 365 mailbox over SMTP with an XOAUTH2 access token.
    OutlookOauth,
    /// Any SMTP server with host/port/username/password.
    Smtp,
    Sendgrid,
    Resend,
    WhatsappBusiness,
    WhatsappSession,
}

impl Provider {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GmailOauth => "gmail_oauth",
            Self::GmailPassword => "gmail_password",
            Self::OutlookOauth => "outlook_oauth",
            Self::Smtp => "smtp",
            Self::Sendgrid => "sendgrid",
            Self::Resend => "resend",
            Self::WhatsappBusiness => "whatsapp_business",
            Self::WhatsappSession => "whatsapp_session",
        }
    }

    /// Providers whose access tokens are minted by an OAuth refresh grant.
    #[must_use]
    pub fn is_oauth(&self) -> bool {
        matches!(self, Self::GmailOauth | Self::OutlookOauth)
    }

    #[must_use]
    pub fn is_email(&self) -> bool {
        !matches!(self, Self::WhatsappBusiness | Self::WhatsappSession)
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Display identity used on outbound email.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FromIdentity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub address: String,
}

impl FromIdentity {
    /// Render as an RFC 5322 mailbox string (`Name <addr>` or bare address).
    #[must_use]
    pub fn mailbox_string(&self) -> String {
        match &self.name {
            Some(name) => format!("{name} <{}>", self.address),
            None => self.address.clone(),
        }
    }
}

/// OAuth material for a tenant's mailbox provider.
#[derive(Clone, Serialize, Deserialize)]
pub struct OauthCredential {
    pub client_id: String,
    #[serde(serialize_with = "serialize_secret")]
    pub client_secret: Secret<String>,
    #[serde(
        default,
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub refresh_token: Option<Secret<String>>,
    #[serde(
        default,
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub access_token: Option<Secret<String>>,
    /// Unix timestamp when the cached access token expires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
}

impl OauthCredential {
    /// True when a cached access token exists and is still comfortably inside
    /// its expiry window.
    #[must_use]
    pub fn is_fresh(&self, now: u64, safety_margin_secs: u64) -> bool {
        self.access_token.is_some()
            && self
                .expires_at
                .is_some_and(|at| now + safety_margin_secs < at)
    }
}

impl std::fmt::Debug for OauthCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OauthCredential")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Direct SMTP login material.
#[derive(Clone, Serialize, Deserialize)]
pub struct SmtpCredential {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    pub username: String,
    #[serde(serialize_with = "serialize_secret")]
    pub password: Secret<String>,
}

fn default_smtp_port() -> u16 {
    587
}

impl std::fmt::Debug for SmtpCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpCredential")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Long-lived WhatsApp Business Cloud API material.
#[derive(Clone, Serialize, Deserialize)]
pub struct BusinessCredential {
    #[serde(serialize_with = "serialize_secret")]
    pub access_token: Secret<String>,
    pub phone_number_id: String,
}

impl std::fmt::Debug for BusinessCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusinessCredential")
            .field("access_token", &"[REDACTED]")
            .field("phone_number_id", &self.phone_number_id)
            .finish()
    }
}

/// Everything a tenant has configured for outbound messaging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelCredential {
    pub tenant_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<Provider>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_provider: Option<Provider>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<FromIdentity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oauth: Option<OauthCredential>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smtp: Option<SmtpCredential>,
    #[serde(
        default,
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub api_key: Option<Secret<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub whatsapp_business: Option<BusinessCredential>,
    /// Replace provider network calls with a simulated send.
    #[serde(default)]
    pub sandbox: bool,
}

impl ChannelCredential {
    /// An empty credential for a tenant that has configured nothing yet.
    #[must_use]
    pub fn empty(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            provider: None,
            fallback_provider: None,
            from: None,
            oauth: None,
            smtp: None,
            api_key: None,
            whatsapp_business: None,
            sandbox: false,
        }
    }
}

/// Partial update written back after a token refresh.
///
/// Only the Token Lifecycle Manager writes these; fields left `None` are
/// untouched (Google never rotates refresh tokens, Microsoft sometimes does).
#[derive(Debug, Clone, Default)]
pub struct CredentialUpdate {
    pub access_token: Option<Secret<String>>,
    pub expires_at: Option<u64>,
    pub refresh_token: Option<Secret<String>>,
}

impl CredentialUpdate {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.expires_at.is_none() && self.refresh_token.is_none()
    }
}

// ── Serde helpers for Secret<String> ────────────────────────────────────────

/// Serialize a `Secret<String>` by exposing its inner value. Use only for
/// fields that must round-trip through the application's credential storage.
pub fn serialize_secret<S: serde::Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

/// Serialize an `Option<Secret<String>>` by exposing its inner value.
pub fn serialize_option_secret<S: serde::Serializer>(
    secret: &Option<Secret<String>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match secret {
        Some(s) => serializer.serialize_some(s.expose_secret()),
        None => serializer.serialize_none(),
    }
}
