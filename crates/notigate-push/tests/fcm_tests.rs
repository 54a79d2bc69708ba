// SPDX-FileCopyrightText: 2026 Notigate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! FCM provider against wiremock.

use notigate_config::PushConfig;
use notigate_core::{PushData, PushErrorCode, PushNotification, PushProvider};
use notigate_push::FcmProvider;
use notigate_push::auth::TokenSource;
use notigate_push::client::FcmClient;
use serde_json::json;
use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SEND_PATH: &str = "/v1/projects/demo/messages:send";

fn provider(server: &MockServer) -> FcmProvider {
    let client = FcmClient::new("demo", TokenSource::Static("test-token".into()))
        .unwrap()
        .with_base_urls(&server.uri(), &server.uri());
    FcmProvider::with_client(client)
}

fn notification() -> PushNotification {
    PushNotification {
        title: "Hello".into(),
        body: "World".into(),
        image_url: None,
    }
}

fn unregistered() -> ResponseTemplate {
    ResponseTemplate::new(404).set_body_json(json!({
        "error": {
            "code": 404,
            "message": "Requested entity was not found.",
            "status": "NOT_FOUND",
            "details": [{
                "@type": "type.googleapis.com/google.firebase.fcm.v1.FcmError",
                "errorCode": "UNREGISTERED"
            }]
        }
    }))
}

#[tokio::test]
async fn send_to_device_returns_the_message_name() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SEND_PATH))
        .and(header("authorization", "Bearer test-token"))
        .and(body_partial_json(json!({
            "message": {
                "token": "device-1",
                "notification": {"title": "Hello", "body": "World"},
                "data": {"orderId": "42"},
                "android": {"priority": "high"}
            }
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"name": "projects/demo/messages/0:1700000000"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut data = PushData::new();
    data.insert("orderId".into(), "42".into());
    let id = provider(&server)
        .send_to_device("device-1", &notification(), &data)
        .await
        .unwrap();
    assert_eq!(id.0, "projects/demo/messages/0:1700000000");
}

#[tokio::test]
async fn unregistered_tokens_are_classified() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SEND_PATH))
        .respond_with(unregistered())
        .mount(&server)
        .await;

    let err = provider(&server)
        .send_to_device("stale", &notification(), &PushData::new())
        .await
        .unwrap_err();
    assert_eq!(err.code, PushErrorCode::Unregistered);
    assert_eq!(err.message, "Requested entity was not found.");
}

#[tokio::test]
async fn multicast_reports_per_token_outcomes_in_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SEND_PATH))
        .and(body_partial_json(json!({"message": {"token": "bad"}})))
        .respond_with(unregistered())
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(SEND_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"name": "projects/demo/messages/ok"})),
        )
        .mount(&server)
        .await;

    let tokens = vec!["a".to_string(), "bad".to_string(), "c".to_string()];
    let report = provider(&server)
        .send_to_devices(&tokens, &notification(), &PushData::new())
        .await
        .unwrap();

    assert_eq!(report.success_count, 2);
    assert_eq!(report.failure_count, 1);
    let order: Vec<&str> = report.responses.iter().map(|r| r.token.as_str()).collect();
    assert_eq!(order, ["a", "bad", "c"]);
    assert_eq!(
        report.responses[1].error.as_ref().map(|e| e.code),
        Some(PushErrorCode::Unregistered)
    );
    assert!(report.responses[0].message_id.is_some());
}

#[tokio::test]
async fn topic_sends_target_the_topic() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SEND_PATH))
        .and(body_partial_json(json!({"message": {"topic": "news"}})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"name": "projects/demo/messages/t1"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let id = provider(&server)
        .send_to_topic("news", &notification(), &PushData::new())
        .await
        .unwrap();
    assert_eq!(id.0, "projects/demo/messages/t1");
}

#[tokio::test]
async fn topic_subscription_reports_failed_indexes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/iid/v1:batchAdd"))
        .and(header("access_token_auth", "true"))
        .and(body_partial_json(json!({
            "to": "/topics/news",
            "registration_tokens": ["t1", "t2", "t3"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{}, {"error": "INVALID_ARGUMENT"}, {}]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/iid/v1:batchRemove"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": [{}]})))
        .expect(1)
        .mount(&server)
        .await;

    let fcm = provider(&server);
    let tokens: Vec<String> = ["t1", "t2", "t3"].iter().map(|t| t.to_string()).collect();
    let report = fcm.subscribe_to_topic(&tokens, "news").await.unwrap();
    assert_eq!(report.success_count, 2);
    assert_eq!(report.failure_count, 1);
    assert_eq!(report.errors[0].index, 1);
    assert_eq!(report.errors[0].reason, "INVALID_ARGUMENT");

    let report = fcm
        .unsubscribe_from_topic(&tokens[..1], "news")
        .await
        .unwrap();
    assert_eq!(report.success_count, 1);
    assert!(report.errors.is_empty());
}

#[tokio::test]
async fn quota_errors_without_details_use_the_rpc_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SEND_PATH))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": {"code": 429, "message": "quota", "status": "RESOURCE_EXHAUSTED"}
        })))
        .mount(&server)
        .await;

    let err = provider(&server)
        .send_to_topic("news", &notification(), &PushData::new())
        .await
        .unwrap_err();
    assert_eq!(err.code, PushErrorCode::QuotaExceeded);
}

#[tokio::test]
async fn service_account_tokens_are_exchanged_once_and_cached() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer"))
        .and(body_string_contains("assertion="))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "ya29.exchanged",
            "expires_in": 3599,
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/projects/notigate-test/messages:send"))
        .and(header("authorization", "Bearer ya29.exchanged"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"name": "projects/notigate-test/messages/1"})),
        )
        .expect(2)
        .mount(&server)
        .await;

    let config = PushConfig {
        enabled: true,
        service_account_path: Some(
            concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/service-account.json").into(),
        ),
        base_url: server.uri(),
        iid_base_url: server.uri(),
        token_url: Some(format!("{}/token", server.uri())),
        ..PushConfig::default()
    };
    let fcm = FcmProvider::from_config(&config).await.unwrap();

    for _ in 0..2 {
        fcm.send_to_device("device-1", &notification(), &PushData::new())
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn rejected_token_exchange_is_a_permission_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "invalid_grant"})))
        .mount(&server)
        .await;

    let config = PushConfig {
        enabled: true,
        service_account_path: Some(
            concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/service-account.json").into(),
        ),
        project_id: Some("override".into()),
        base_url: server.uri(),
        iid_base_url: server.uri(),
        token_url: Some(format!("{}/token", server.uri())),
    };
    let err = FcmProvider::from_config(&config)
        .await
        .unwrap()
        .send_to_device("device-1", &notification(), &PushData::new())
        .await
        .unwrap_err();
    assert_eq!(err.code, PushErrorCode::PermissionDenied);
}

#[tokio::test]
async fn missing_service_account_file_is_a_config_error() {
    let config = PushConfig {
        enabled: true,
        service_account_path: Some("/nonexistent/notigate/key.json".into()),
        ..PushConfig::default()
    };
    let err = FcmProvider::from_config(&config).await.unwrap_err();
    assert!(err.to_string().contains("service account"), "{err}");
}

#[tokio::test]
async fn project_id_is_required_somewhere() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = std::fs::read_to_string(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/tests/fixtures/service-account.json"
    ))
    .unwrap();
    let mut key: serde_json::Value = serde_json::from_str(&fixture).unwrap();
    key.as_object_mut().unwrap().remove("project_id");
    let path = dir.path().join("key.json");
    std::fs::write(&path, key.to_string()).unwrap();

    let config = PushConfig {
        enabled: true,
        service_account_path: Some(path.to_string_lossy().into_owned()),
        ..PushConfig::default()
    };
    let err = FcmProvider::from_config(&config).await.unwrap_err();
    assert!(err.to_string().contains("project_id"), "{err}");
}
