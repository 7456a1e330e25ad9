//! Webhook relay delivery tests

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use statsync::config::NotificationConfig;
use statsync::notifications::{DeliveryError, Message, Notifier, WebhookNotifier};

fn relay_config() -> NotificationConfig {
    NotificationConfig {
        service_name: "Stats Service".to_string(),
        timeout_secs: 5,
        ..NotificationConfig::default()
    }
}

fn notifier(server: &MockServer, config: &NotificationConfig, operator: &str) -> WebhookNotifier {
    WebhookNotifier::new(config, &format!("{}/relay", server.uri()), operator).unwrap()
}

#[tokio::test]
async fn test_operator_message_posted_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/relay"))
        .and(body_partial_json(json!({
            "to": "ops@example.com",
            "subject": "Stats Service - Error Processing Profile",
            "text": "profile ada failed"
        })))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    notifier(&server, &relay_config(), "ops@example.com")
        .notify_operator("Stats Service - Error Processing Profile", "profile ada failed")
        .await;
}

#[tokio::test]
async fn test_welcome_carries_destination_link() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/relay"))
        .and(body_partial_json(json!({
            "to": "ada@example.com",
            "subject": "Stats Service"
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    notifier(&server, &relay_config(), "ops@example.com")
        .notify_subscriber(
            "ada@example.com",
            "Ada",
            "https://docs.google.com/spreadsheets/d/abc12345",
        )
        .await;

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert!(body["text"].as_str().unwrap().contains("Ada"));
    assert!(body["html"]
        .as_str()
        .unwrap()
        .contains("https://docs.google.com/spreadsheets/d/abc12345"));
}

#[tokio::test]
async fn test_bearer_token_sent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/relay"))
        .and(header("authorization", "Bearer relay-secret"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let config = NotificationConfig {
        webhook_token: Some("relay-secret".to_string()),
        ..relay_config()
    };
    notifier(&server, &config, "ops@example.com")
        .notify_operator("subject", "body")
        .await;
}

/// A failing relay is neither retried nor fatal
#[tokio::test]
async fn test_relay_failure_is_single_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/relay"))
        .respond_with(ResponseTemplate::new(500).set_body_string("relay down"))
        .expect(1)
        .mount(&server)
        .await;

    let webhook = notifier(&server, &relay_config(), "ops@example.com");
    webhook.notify_operator("subject", "body").await;
}

#[tokio::test]
async fn test_deliver_reports_rejection() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/relay"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .mount(&server)
        .await;

    let webhook = notifier(&server, &relay_config(), "ops@example.com");
    let message = Message::new("ops@example.com", "subject", "body", String::new());
    let err = webhook.deliver(&message).await.unwrap_err();
    assert!(matches!(
        err,
        DeliveryError::Rejected { status: 429, ref body } if body == "slow down"
    ));
}

#[tokio::test]
async fn test_missing_operator_sends_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    notifier(&server, &relay_config(), "")
        .notify_operator("subject", "body")
        .await;
}
