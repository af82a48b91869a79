#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::{collections::HashMap, sync::Arc};

use secrecy::Secret;

use {
    marquee_credentials::{
        BusinessCredential, ChannelCredential, CredentialStore, MemoryCredentialStore, Provider,
    },
    marquee_delivery::{DeliveryError, DeliveryService},
    marquee_oauth::TokenManager,
    marquee_whatsapp::{BridgeTransport, SessionRegistry, SessionState},
    marquee_whatsapp_business::{BusinessChannel, TemplateCatalog, TemplateDefinition, TemplateSend},
};

fn service(store: Arc<MemoryCredentialStore>) -> DeliveryService {
    let tokens = TokenManager::new(Arc::clone(&store) as Arc<dyn CredentialStore>);
    // The bridge transport is never connected in these tests.
    let sessions = SessionRegistry::new(Arc::new(BridgeTransport::default()));

    let mut catalog = TemplateCatalog::new();
    catalog.register(TemplateDefinition {
        name: "rsvp_invite".to_string(),
        category: "rsvp".to_string(),
        language: "de".to_string(),
        body_params: vec![],
    });

    DeliveryService::new(
        store as Arc<dyn CredentialStore>,
        Arc::new(tokens),
        Arc::new(sessions),
        BusinessChannel::new(catalog),
    )
}

fn invite() -> TemplateSend {
    TemplateSend {
        template: "rsvp_invite".to_string(),
        recipient: "+49 171 5550123".to_string(),
        base_params: HashMap::new(),
        params: HashMap::new(),
    }
}

#[tokio::test]
async fn status_without_session_is_uninitialized() {
    let service = service(Arc::new(MemoryCredentialStore::new()));

    assert_eq!(
        service.whatsapp_status("w1").await,
        SessionState::Uninitialized
    );
    assert!(service.whatsapp_qr_code("w1").await.is_none());
}

#[tokio::test]
async fn session_send_without_session_is_not_ready() {
    let service = service(Arc::new(MemoryCredentialStore::new()));

    let result = service
        .send_whatsapp_message("w1", "+49 171 5550123", "hi")
        .await;

    assert!(!result.success);
    assert!(matches!(
        result.error,
        Some(DeliveryError::SessionNotReady { .. })
    ));
}

#[tokio::test]
async fn template_without_business_credential_is_credential_missing() {
    let store = Arc::new(MemoryCredentialStore::new());
    store.insert(ChannelCredential::empty("w1")).await;
    let service = service(store);

    let result = service.send_whatsapp_template("w1", &invite()).await;

    assert!(!result.success);
    assert!(matches!(
        result.error,
        Some(DeliveryError::CredentialMissing)
    ));
}

#[tokio::test]
async fn unknown_tenant_is_credential_missing() {
    let service = service(Arc::new(MemoryCredentialStore::new()));

    let result = service.send_whatsapp_template("w1", &invite()).await;

    assert!(!result.success);
    assert!(matches!(
        result.error,
        Some(DeliveryError::CredentialMissing)
    ));
}

#[tokio::test]
async fn sandbox_template_send_simulates_delivery() {
    let store = Arc::new(MemoryCredentialStore::new());
    store
        .insert(ChannelCredential {
            sandbox: true,
            whatsapp_business: Some(BusinessCredential {
                access_token: Secret::new("token".into()),
                phone_number_id: "123456789".into(),
            }),
            ..ChannelCredential::empty("w1")
        })
        .await;
    let service = service(store);

    let result = service.send_whatsapp_template("w1", &invite()).await;
    assert!(result.success);
    assert!(result.message_id.unwrap().starts_with("sandbox-"));

    // Sandbox still validates the template name.
    let mut bogus = invite();
    bogus.template = "unapproved".to_string();
    let result = service.send_whatsapp_template("w1", &bogus).await;
    assert!(matches!(
        result.error,
        Some(DeliveryError::TemplateNotFound { .. })
    ));
}

#[tokio::test]
async fn logout_without_session_is_a_noop() {
    let service = service(Arc::new(MemoryCredentialStore::new()));
    service.logout_whatsapp("w1").await.unwrap();
}
