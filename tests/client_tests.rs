mod common;

use std::sync::Arc;

use anyhow::Result;
use evemail_relay::{
    clients::{account::AccountApiClient, circuit_breaker::CircuitBreaker, mailer::HttpMailer},
    models::{mail::OutgoingEmail, relay_config::AccountCredentials},
    traits::{AccountApi, AccountApiProvider, Mailer},
};
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_json, header, method, path, query_param},
};

fn credentials() -> AccountCredentials {
    AccountCredentials {
        key_id: 123,
        vcode: "vcode".to_string(),
        character_id: 90000001,
    }
}

fn account_client(server: &MockServer) -> Result<AccountApiClient> {
    let config = common::test_config(&server.uri(), "http://unused.invalid");
    let breaker = Arc::new(CircuitBreaker::new(
        "account_api",
        config.circuit_breaker_config(),
    ));
    AccountApiClient::new(&config, breaker)
}

/// Test: Mail headers are read with credentials and flattened
#[tokio::test]
async fn test_mail_headers_are_parsed() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/char/messages"))
        .and(query_param("keyID", "123"))
        .and(query_param("vCode", "vcode"))
        .and(query_param("characterID", "90000001"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 1, "sender_id": 500, "timestamp": 1000000000, "title": "Ops", "to": {"org_id": 98000001}},
            {"id": 2, "sender_id": 501, "timestamp": 1000000001, "title": "DM", "to": {"org_id": null}}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let session = account_client(&server)?.session(&credentials());
    let headers = session.list_mail_headers().await?;

    assert_eq!(headers.len(), 2);
    assert_eq!(headers[0].recipient_org_id, Some(98000001));
    assert_eq!(headers[0].title, "Ops");
    assert_eq!(headers[1].recipient_org_id, None);

    Ok(())
}

/// Test: Bodies are requested only for the given ids
#[tokio::test]
async fn test_bodies_and_names_use_id_lists() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/char/message_bodies"))
        .and(query_param("ids", "1,3"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"1": "<p>a</p>", "3": "<p>c</p>"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/eve/character_names"))
        .and(query_param("ids", "500"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"500": "Alice"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/char/notification_texts"))
        .and(query_param("ids", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "10": {
                "aggressorID": 1001, "aggressorCorpID": 2002, "aggressorAllianceID": 3003,
                "typeID": 16213, "moonID": 40000001, "solarSystemID": 30000142,
                "shieldValue": 0.5, "armorValue": 1.0, "hullValue": 1.0
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let session = account_client(&server)?.session(&credentials());

    let bodies = session.fetch_mail_bodies(&[1, 3]).await?;
    assert_eq!(bodies.get(&3).map(String::as_str), Some("<p>c</p>"));

    let names = session.resolve_character_names(&[500]).await?;
    assert_eq!(names.get(&500).map(String::as_str), Some("Alice"));

    let texts = session.fetch_notification_bodies(&[10]).await?;
    assert_eq!(texts.get(&10), Some(&common::attack_body()));

    Ok(())
}

/// Test: Server errors are retried, then surfaced
#[tokio::test]
async fn test_account_api_errors_are_retried_then_returned() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/char/notifications"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;

    let session = account_client(&server)?.session(&credentials());

    assert!(session.list_notification_headers().await.is_err());

    Ok(())
}

/// Test: The mailer posts the message with bearer auth
#[tokio::test]
async fn test_mailer_posts_message() -> Result<()> {
    let server = MockServer::start().await;
    let email = OutgoingEmail {
        to: "ops@example.com".to_string(),
        from: "relay@example.com".to_string(),
        subject: "[EVEMail] Ops".to_string(),
        html: "<p>Sent by Alice</p>".to_string(),
    };

    Mock::given(method("POST"))
        .and(path("/send"))
        .and(header("authorization", "Bearer secret-token"))
        .and(body_json(json!({
            "to": "ops@example.com",
            "from": "relay@example.com",
            "subject": "[EVEMail] Ops",
            "html": "<p>Sent by Alice</p>"
        })))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let config = common::test_config("http://unused.invalid", &format!("{}/send", server.uri()));
    let breaker = Arc::new(CircuitBreaker::new("mail_api", config.circuit_breaker_config()));
    let mailer = HttpMailer::new(&config, breaker)?;

    mailer.send(&email).await?;

    Ok(())
}

/// Test: Rejected mail is an error for that item
#[tokio::test]
async fn test_mailer_rejection_is_an_error() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/send"))
        .respond_with(ResponseTemplate::new(500).set_body_string("mailbox full"))
        .mount(&server)
        .await;

    let config = common::test_config("http://unused.invalid", &format!("{}/send", server.uri()));
    let breaker = Arc::new(CircuitBreaker::new("mail_api", config.circuit_breaker_config()));
    let mailer = HttpMailer::new(&config, breaker)?;

    let email = OutgoingEmail {
        to: "ops@example.com".to_string(),
        from: "relay@example.com".to_string(),
        subject: "s".to_string(),
        html: "h".to_string(),
    };
    let err = mailer.send(&email).await.expect_err("500 must fail");

    assert!(err.to_string().contains("mailbox full"));

    Ok(())
}
