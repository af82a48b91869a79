#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use {async_trait::async_trait, secrecy::Secret, serde_json::json};

use {
    marquee_credentials::{
        ChannelCredential, CredentialStore, FromIdentity, MemoryCredentialStore, OauthCredential,
        Provider,
    },
    marquee_delivery::{DeliveryError, EmailCoordinator, TransportBuilder},
    marquee_email::{EmailMessage, MailTransport, SendReceipt},
    marquee_oauth::TokenManager,
};

#[derive(Clone, Copy, Debug)]
enum Step {
    Deliver(&'static str),
    AuthReject,
    SendReject,
    BuildFail,
}

/// Pops one scripted step per transport build.
struct ScriptedBuilder {
    steps: Mutex<VecDeque<Step>>,
    builds: AtomicUsize,
    providers: Mutex<Vec<Provider>>,
}

impl ScriptedBuilder {
    fn new(steps: impl IntoIterator<Item = Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into_iter().collect()),
            builds: AtomicUsize::new(0),
            providers: Mutex::new(Vec::new()),
        })
    }

    fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    fn providers(&self) -> Vec<Provider> {
        self.providers.lock().unwrap().clone()
    }
}

#[async_trait]
impl TransportBuilder for ScriptedBuilder {
    async fn build(
        &self,
        _credential: &ChannelCredential,
        provider: Provider,
        _tokens: &TokenManager,
    ) -> marquee_email::Result<Box<dyn MailTransport>> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        self.providers.lock().unwrap().push(provider);
        let step = self
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .expect("unscripted transport build");
        if matches!(step, Step::BuildFail) {
            return Err(marquee_email::Error::config("scripted build failure"));
        }
        Ok(Box::new(ScriptedTransport { provider, step }))
    }
}

#[derive(Debug)]
struct ScriptedTransport {
    provider: Provider,
    step: Step,
}

#[async_trait]
impl MailTransport for ScriptedTransport {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn send(&self, _message: &EmailMessage) -> marquee_email::Result<SendReceipt> {
        match self.step {
            Step::Deliver(id) => Ok(SendReceipt {
                message_id: Some(id.to_string()),
            }),
            Step::AuthReject => Err(marquee_email::Error::auth("535 5.7.8 bad credentials")),
            Step::SendReject => Err(marquee_email::Error::send("550 mailbox unavailable")),
            Step::BuildFail => unreachable!("build failures never produce a transport"),
        }
    }
}

fn oauth_credential(tenant_id: &str, expires_at: u64) -> ChannelCredential {
    ChannelCredential {
        provider: Some(Provider::GmailOauth),
        from: Some(FromIdentity {
            name: Some("Events".into()),
            address: "events@example.com".into(),
        }),
        oauth: Some(OauthCredential {
            client_id: "client-1".into(),
            client_secret: Secret::new("hush".into()),
            refresh_token: Some(Secret::new("refresh-1".into())),
            access_token: Some(Secret::new("access-stale".into())),
            expires_at: Some(expires_at),
        }),
        ..ChannelCredential::empty(tenant_id)
    }
}

fn message() -> EmailMessage {
    EmailMessage::new("guest@example.com", "Save the date").with_text("See you there")
}

struct Setup {
    store: Arc<MemoryCredentialStore>,
    builder: Arc<ScriptedBuilder>,
    coordinator: EmailCoordinator,
}

fn setup(steps: impl IntoIterator<Item = Step>, token_url: Option<String>) -> Setup {
    let store = Arc::new(MemoryCredentialStore::new());
    let mut tokens = TokenManager::new(Arc::clone(&store) as Arc<dyn CredentialStore>);
    if let Some(url) = token_url {
        tokens = tokens.with_token_url(url);
    }
    let builder = ScriptedBuilder::new(steps);
    let coordinator = EmailCoordinator::with_builder(
        Arc::clone(&store) as Arc<dyn CredentialStore>,
        Arc::new(tokens),
        Arc::clone(&builder) as Arc<dyn TransportBuilder>,
    );
    Setup {
        store,
        builder,
        coordinator,
    }
}

#[tokio::test]
async fn empty_recipient_list_never_builds_a_transport() {
    let s = setup([], None);
    s.store.insert(oauth_credential("w1", u64::MAX)).await;

    let mut message = message();
    message.to.clear();
    let result = s.coordinator.send_email("w1", &message).await;

    assert!(!result.success);
    assert!(matches!(result.error, Some(DeliveryError::InvalidRequest { .. })));
    assert_eq!(s.builder.builds(), 0);
}

#[tokio::test]
async fn unconfigured_tenant_fails_without_network() {
    let s = setup([], None);
    s.store
        .insert(ChannelCredential::empty("w1"))
        .await;

    let result = s.coordinator.send_email("w1", &message()).await;

    assert!(!result.success);
    assert!(matches!(result.error, Some(DeliveryError::CredentialMissing)));
    assert_eq!(s.builder.builds(), 0);
}

#[tokio::test]
async fn successful_primary_needs_one_transport() {
    let s = setup([Step::Deliver("msg-1")], None);
    s.store.insert(oauth_credential("w1", u64::MAX)).await;

    let result = s.coordinator.send_email("w1", &message()).await;

    assert!(result.success);
    assert_eq!(result.provider, Some(Provider::GmailOauth));
    assert_eq!(result.message_id.as_deref(), Some("msg-1"));
    assert_eq!(s.builder.builds(), 1);
}

#[tokio::test]
async fn auth_failure_refreshes_once_and_retries_once() {
    let mut server = mockito::Server::new_async().await;
    let refresh = server
        .mock("POST", "/token")
        .with_status(200)
        .with_body(
            json!({ "access_token": "access-new", "expires_in": 3600 }).to_string(),
        )
        .expect(1)
        .create_async()
        .await;

    let s = setup(
        [Step::AuthReject, Step::Deliver("msg-2")],
        Some(format!("{}/token", server.url())),
    );
    s.store.insert(oauth_credential("w1", u64::MAX)).await;

    let result = s.coordinator.send_email("w1", &message()).await;

    assert!(result.success);
    assert_eq!(result.message_id.as_deref(), Some("msg-2"));
    assert_eq!(s.builder.builds(), 2);
    refresh.assert_async().await;

    // The forced refresh persisted the new token.
    let oauth = s.store.get("w1").await.unwrap().oauth.unwrap();
    assert_eq!(
        secrecy::ExposeSecret::expose_secret(&oauth.access_token.unwrap()),
        "access-new"
    );
}

#[tokio::test]
async fn failed_retry_falls_back_to_second_provider() {
    let mut server = mockito::Server::new_async().await;
    let refresh = server
        .mock("POST", "/token")
        .with_status(200)
        .with_body(
            json!({ "access_token": "access-new", "expires_in": 3600 }).to_string(),
        )
        .expect(1)
        .create_async()
        .await;

    let s = setup(
        [Step::AuthReject, Step::AuthReject, Step::Deliver("msg-3")],
        Some(format!("{}/token", server.url())),
    );
    let credential = ChannelCredential {
        fallback_provider: Some(Provider::Sendgrid),
        api_key: Some(Secret::new("sg-key".into())),
        ..oauth_credential("w1", u64::MAX)
    };
    s.store.insert(credential).await;

    let result = s.coordinator.send_email("w1", &message()).await;

    assert!(result.success);
    assert_eq!(result.provider, Some(Provider::Sendgrid));
    assert_eq!(
        s.builder.providers(),
        vec![Provider::GmailOauth, Provider::GmailOauth, Provider::Sendgrid]
    );
    refresh.assert_async().await;
}

#[tokio::test]
async fn send_failure_skips_refresh_and_uses_fallback() {
    let s = setup([Step::SendReject, Step::Deliver("msg-4")], None);
    let credential = ChannelCredential {
        fallback_provider: Some(Provider::Sendgrid),
        api_key: Some(Secret::new("sg-key".into())),
        ..oauth_credential("w1", u64::MAX)
    };
    s.store.insert(credential).await;

    let result = s.coordinator.send_email("w1", &message()).await;

    assert!(result.success);
    assert_eq!(result.provider, Some(Provider::Sendgrid));
    // No refresh endpoint configured: a refresh attempt would have failed
    // loudly, so two builds means send-shaped errors skip the retry.
    assert_eq!(s.builder.builds(), 2);
}

#[tokio::test]
async fn both_legs_failing_reports_the_fallback_error() {
    let s = setup([Step::BuildFail, Step::SendReject], None);
    let credential = ChannelCredential {
        fallback_provider: Some(Provider::Sendgrid),
        api_key: Some(Secret::new("sg-key".into())),
        ..oauth_credential("w1", u64::MAX)
    };
    s.store.insert(credential).await;

    let result = s.coordinator.send_email("w1", &message()).await;

    assert!(!result.success);
    assert_eq!(result.provider, Some(Provider::Sendgrid));
    assert!(matches!(result.error, Some(DeliveryError::Send { .. })));
}

#[tokio::test]
async fn no_fallback_reports_the_primary_error() {
    let s = setup([Step::SendReject], None);
    s.store.insert(oauth_credential("w1", u64::MAX)).await;

    let result = s.coordinator.send_email("w1", &message()).await;

    assert!(!result.success);
    assert_eq!(result.provider, Some(Provider::GmailOauth));
    assert!(matches!(result.error, Some(DeliveryError::Send { .. })));
    assert_eq!(s.builder.builds(), 1);
}

#[tokio::test]
async fn fallback_matching_primary_is_ignored() {
    let s = setup([Step::SendReject], None);
    let credential = ChannelCredential {
        fallback_provider: Some(Provider::GmailOauth),
        ..oauth_credential("w1", u64::MAX)
    };
    s.store.insert(credential).await;

    let result = s.coordinator.send_email("w1", &message()).await;

    assert!(!result.success);
    assert_eq!(s.builder.builds(), 1);
}

#[tokio::test]
async fn fallback_leg_reads_the_freshest_credential() {
    // The fallback leg re-reads the store, so a credential fixed after the
    // primary leg failed is what the fallback transport is built from.
    let s = setup([Step::SendReject, Step::Deliver("msg-5")], None);
    let credential = ChannelCredential {
        fallback_provider: Some(Provider::Resend),
        api_key: Some(Secret::new("re-key".into())),
        ..oauth_credential("w1", u64::MAX)
    };
    s.store.insert(credential).await;

    let result = s.coordinator.send_email("w1", &message()).await;
    assert!(result.success);
    assert_eq!(result.provider, Some(Provider::Resend));
}
