#![allow(clippy::unwrap_used, clippy::expect_used)]

use secrecy::Secret;
use serde_json::json;

use {
    marquee_credentials::FromIdentity,
    marquee_email::{
        EmailMessage, Error, MailTransport, resend::ResendTransport, sendgrid::SendgridTransport,
    },
};

fn from() -> FromIdentity {
    FromIdentity {
        name: Some("Ana & Luis".into()),
        address: "events@example.com".into(),
    }
}

fn message() -> EmailMessage {
    EmailMessage::new("guest@example.com", "Save the date")
        .with_text("You are invited")
        .with_html("<p>You are invited</p>")
}

#[tokio::test]
async fn sendgrid_posts_v3_payload_and_reads_header_id() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v3/mail/send")
        .match_header("authorization", "Bearer sg-key")
        .match_body(mockito::Matcher::PartialJson(json!({
            "personalizations": [{ "to": [{ "email": "guest@example.com" }] }],
            "from": { "email": "events@example.com" },
            "subject": "Save the date",
        })))
        .with_status(202)
        .with_header("x-message-id", "sg-msg-1")
        .expect(1)
        .create_async()
        .await;

    let transport = SendgridTransport::new(Secret::new("sg-key".into()), from())
        .with_base_url(server.url());
    let receipt = transport.send(&message()).await.unwrap();
    assert_eq!(receipt.message_id.as_deref(), Some("sg-msg-1"));

    mock.assert_async().await;
}

#[tokio::test]
async fn sendgrid_unauthorized_classifies_as_auth() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v3/mail/send")
        .with_status(401)
        .with_body(r#"{"errors":[{"message":"bad key"}]}"#)
        .create_async()
        .await;

    let transport = SendgridTransport::new(Secret::new("bad".into()), from())
        .with_base_url(server.url());
    let err = transport.send(&message()).await.unwrap_err();
    assert!(err.is_auth());
}

#[tokio::test]
async fn sendgrid_rate_limit_is_surfaced() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v3/mail/send")
        .with_status(429)
        .with_body("too many requests")
        .create_async()
        .await;

    let transport = SendgridTransport::new(Secret::new("sg-key".into()), from())
        .with_base_url(server.url());
    let err = transport.send(&message()).await.unwrap_err();
    assert!(matches!(err, Error::RateLimited { .. }));
}

#[tokio::test]
async fn resend_posts_emails_payload_and_reads_body_id() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/emails")
        .match_header("authorization", "Bearer re-key")
        .match_body(mockito::Matcher::PartialJson(json!({
            "from": "Ana & Luis <events@example.com>",
            "to": ["guest@example.com"],
            "subject": "Save the date",
            "html": "<p>You are invited</p>",
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id":"re-msg-1"}"#)
        .expect(1)
        .create_async()
        .await;

    let transport =
        ResendTransport::new(Secret::new("re-key".into()), from()).with_base_url(server.url());
    let receipt = transport.send(&message()).await.unwrap();
    assert_eq!(receipt.message_id.as_deref(), Some("re-msg-1"));

    mock.assert_async().await;
}

#[tokio::test]
async fn resend_server_error_classifies_as_send_failure() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/emails")
        .with_status(500)
        .with_body("internal")
        .create_async()
        .await;

    let transport =
        ResendTransport::new(Secret::new("re-key".into()), from()).with_base_url(server.url());
    let err = transport.send(&message()).await.unwrap_err();
    assert!(matches!(err, Error::Send { .. }));
}
