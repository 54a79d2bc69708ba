// SPDX-FileCopyrightText: 2026 Notigate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Router-level tests driven through `tower::ServiceExt::oneshot`.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use notigate_config::ServerConfig;
use notigate_core::{
    DisconnectReason, ImageSource, OutboundContent, PushError, PushErrorCode, PushProvider,
};
use notigate_gateway::{FixedWindowLimiter, GatewayState, RateLimits, build_router};
use notigate_test_utils::{MockConnector, MockPushProvider, PushCall};
use notigate_whatsapp::{SessionConfig, SessionManager};
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

const KEY: &str = "test-key";

struct App {
    router: Router,
    push: Arc<MockPushProvider>,
    connector: Arc<MockConnector>,
    manager: Arc<SessionManager>,
    _dir: TempDir,
}

fn server_config() -> ServerConfig {
    ServerConfig {
        api_keys: vec![KEY.to_string()],
        ..ServerConfig::default()
    }
}

fn build(connector: MockConnector, limits: RateLimits, with_whatsapp: bool) -> App {
    let dir = tempfile::tempdir().unwrap();
    let mut config = SessionConfig::with_auth_dir(dir.path().join("auth"));
    config.print_qr = false;
    config.text_pacing = Duration::from_millis(5);
    config.image_pacing = Duration::from_millis(5);
    config.reconnect_delay = Duration::from_millis(10);

    let connector = Arc::new(connector);
    let manager = SessionManager::new(config, connector.clone());
    let push = Arc::new(MockPushProvider::new());

    let state = GatewayState::new(
        Some(push.clone() as Arc<dyn PushProvider>),
        with_whatsapp.then(|| manager.clone()),
    );
    App {
        router: build_router(state, &server_config(), &limits),
        push,
        connector,
        manager,
        _dir: dir,
    }
}

fn app() -> App {
    build(MockConnector::new(), RateLimits::default(), true)
}

impl App {
    async fn call(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, json)
    }

    async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        self.call(authed("POST", path).header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap())
            .await
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        self.call(authed("GET", path).body(Body::empty()).unwrap())
            .await
    }
}

fn authed(method: &str, path: &str) -> axum::http::request::Builder {
    Request::builder()
        .method(method)
        .uri(format!("/api/notifications{path}"))
        .header("x-api-key", KEY)
}

fn notification() -> Value {
    json!({"title": "Order shipped", "body": "Your order is on its way"})
}

// --- Public surface and auth ---

#[tokio::test]
async fn index_and_health_are_public() {
    let app = app();
    let (status, body) = app
        .call(Request::get("/").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, body) = app
        .call(
            Request::get("/api/notifications/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["push"], true);
    assert_eq!(body["whatsapp"]["state"], "disconnected");
}

impl App {
    async fn health_checks(&self) -> Value {
        let (status, body) = self
            .call(
                Request::get("/api/notifications/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        body["checks"].clone()
    }
}

#[tokio::test]
async fn health_reports_adapter_checks() {
    let app = app();

    let checks = app.health_checks().await;
    assert_eq!(checks[0]["name"], "mock-push");
    assert_eq!(checks[0]["status"], "healthy");
    assert_eq!(checks[1]["name"], "whatsapp");
    assert_eq!(checks[1]["type"], "Channel");
    assert_eq!(checks[1]["status"], "degraded");

    app.manager.initialize().await.unwrap();
    app.manager.wait_until_connected(Duration::from_secs(5)).await.unwrap();
    assert_eq!(app.health_checks().await[1]["status"], "healthy");

    app.connector
        .latest()
        .await
        .unwrap()
        .close(DisconnectReason::LoggedOut)
        .await;
    let mut rx = app.manager.subscribe();
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| s.logged_out))
        .await
        .unwrap()
        .unwrap();

    let checks = app.health_checks().await;
    assert_eq!(checks[1]["status"], "unhealthy");
    assert!(checks[1]["detail"].as_str().unwrap().contains("logged out"));
}

#[tokio::test]
async fn health_omits_disabled_adapters() {
    let app = build(MockConnector::new(), RateLimits::default(), false);
    let checks = app.health_checks().await;
    assert_eq!(checks.as_array().unwrap().len(), 1);
    assert_eq!(checks[0]["name"], "mock-push");
}

#[tokio::test]
async fn api_key_is_required() {
    let app = app();
    let (status, body) = app
        .call(
            Request::get("/api/notifications/whatsapp/status")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);

    let (status, _) = app
        .call(
            Request::get("/api/notifications/whatsapp/status")
                .header("x-api-key", "wrong")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn no_configured_keys_rejects_everything() {
    let state = GatewayState::new(Some(Arc::new(MockPushProvider::new())), None);
    let router = build_router(state, &ServerConfig::default(), &RateLimits::default());
    let response = router
        .oneshot(
            Request::post("/api/notifications/send-to-device")
                .header("x-api-key", "anything")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn foreign_origins_are_refused() {
    let app = app();
    let (status, body) = app
        .call(
            authed("GET", "/whatsapp/status")
                .header(header::ORIGIN, "https://evil.example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "origin_denied");

    let (status, _) = app
        .call(
            authed("GET", "/whatsapp/status")
                .header(header::ORIGIN, "http://localhost:3000")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn unknown_paths_are_json_404s() {
    let app = app();
    let (status, body) = app.get("/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert!(body["path"].as_str().unwrap().ends_with("/nope"));
    assert_eq!(body["method"], "GET");
}

// --- Push ---

#[tokio::test]
async fn send_to_device_reaches_the_provider() {
    let app = app();
    let (status, body) = app
        .post(
            "/send-to-device",
            json!({"token": "device-1", "notification": notification(), "data": {"orderId": "42"}}),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["success"], true);
    assert!(body["data"]["messageId"].as_str().is_some());

    match &app.push.calls().await[..] {
        [PushCall::Device { token, data, .. }] => {
            assert_eq!(token, "device-1");
            assert_eq!(data["orderId"], "42");
        }
        other => panic!("unexpected calls: {other:?}"),
    }
}

#[tokio::test]
async fn push_payloads_are_validated() {
    let app = app();
    let long_title = json!({"title": "t".repeat(101), "body": "b"});
    let (status, body) = app
        .post("/send-to-device", json!({"token": "d", "notification": long_title}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("title"));

    let (status, _) = app
        .post("/send-to-topic", json!({"topic": "bad topic", "notification": notification()}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post("/send-to-multiple-devices", json!({"tokens": [], "notification": notification()}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .call(
            authed("POST", "/send-to-device")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(app.push.calls().await.is_empty());
}

#[tokio::test]
async fn unregistered_tokens_are_404() {
    let app = app();
    app.push
        .fail_token("stale", PushError::new(PushErrorCode::Unregistered, "gone"))
        .await;
    let (status, body) = app
        .post("/send-to-device", json!({"token": "stale", "notification": notification()}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "UNREGISTERED");
}

#[tokio::test]
async fn multicast_reports_each_token() {
    let app = app();
    app.push
        .fail_token("bad", PushError::new(PushErrorCode::Unregistered, "gone"))
        .await;
    let (status, body) = app
        .post(
            "/send-to-multiple-devices",
            json!({"tokens": ["a", "bad", "c"], "notification": notification()}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert_eq!(data["successCount"], 2);
    assert_eq!(data["failureCount"], 1);
    assert_eq!(data["responses"][1]["token"], "bad");
    assert_eq!(data["responses"][1]["success"], false);
    assert_eq!(data["responses"][1]["error"]["code"], "UNREGISTERED");
    assert_eq!(data["responses"][2]["error"], Value::Null);
}

#[tokio::test]
async fn topic_subscription_accepts_a_single_token() {
    let app = app();
    let (status, body) = app
        .post("/subscribe-to-topic", json!({"tokens": "t1", "topic": "news"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["successCount"], 1);
    assert_eq!(
        app.push.calls().await,
        vec![PushCall::Subscribe {
            tokens: vec!["t1".into()],
            topic: "news".into()
        }]
    );

    let (status, _) = app
        .post("/unsubscribe-from-topic", json!({"tokens": ["t1", "t2"], "topic": "news"}))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn notification_routes_are_rate_limited() {
    let limits = RateLimits {
        notification: Some(Arc::new(FixedWindowLimiter::new(
            "notification",
            2,
            Duration::from_secs(60),
        ))),
        ..RateLimits::default()
    };
    let app = build(MockConnector::new(), limits, true);
    let body = json!({"token": "d", "notification": notification()});

    for _ in 0..2 {
        let (status, _) = app.post("/send-to-device", body.clone()).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, response) = app.post("/send-to-topic", json!({"topic": "news", "notification": notification()})).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response["code"], "rate_limited");
    assert!(response["retry_after"].as_u64().unwrap() > 0);

    // Other route groups are unaffected.
    let (status, _) = app
        .post("/subscribe-to-topic", json!({"tokens": ["t"], "topic": "news"}))
        .await;
    assert_eq!(status, StatusCode::OK);
}

// --- WhatsApp ---

#[tokio::test]
async fn whatsapp_send_connects_on_demand() {
    let app = app();
    let (status, body) = app
        .post("/whatsapp/send", json!({"phoneNumber": "081234567890", "message": "hello"}))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["to"], "6281234567890@s.whatsapp.net");
    assert_eq!(body["data"]["original"], "081234567890");
    assert_eq!(app.connector.connect_count(), 1);

    let (status, body) = app.get("/whatsapp/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["isConnected"], true);
}

#[tokio::test]
async fn whatsapp_input_errors_are_400() {
    let app = app();
    let (status, _) = app
        .post("/whatsapp/send", json!({"phoneNumber": "", "message": "hello"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .post("/whatsapp/send", json!({"phoneNumber": "abc", "message": "hello"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation");

    let (status, body) = app
        .post("/whatsapp/broadcast", json!({"phoneNumbers": ["123", "45"], "message": "hi"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("no valid"));

    let (status, _) = app
        .post(
            "/whatsapp/broadcast-list/participants",
            json!({"broadcastId": "120363000000000001@g.us", "action": "promote", "participants": ["081234567890"]}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn broadcast_filters_and_reports() {
    let app = app();
    let (status, body) = app
        .post(
            "/whatsapp/broadcast",
            json!({"phoneNumbers": ["081234567890", "081234567890", "12", "081298765432"], "message": "hi"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["total"], 2);
    assert_eq!(body["data"]["successful"], 2);
    let conn = app.connector.latest().await.unwrap();
    assert_eq!(conn.sent_count().await, 2);
}

#[tokio::test]
async fn logged_out_session_is_503() {
    let app = app();
    app.manager.initialize().await.unwrap();
    app.manager.wait_until_connected(Duration::from_secs(5)).await.unwrap();
    app.connector
        .latest()
        .await
        .unwrap()
        .close(DisconnectReason::LoggedOut)
        .await;
    let mut rx = app.manager.subscribe();
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| s.logged_out))
        .await
        .unwrap()
        .unwrap();

    let (status, body) = app
        .post("/whatsapp/send", json!({"phoneNumber": "081234567890", "message": "hello"}))
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "logged_out");
}

#[tokio::test]
async fn qr_endpoints_follow_the_pairing_token() {
    let app = build(MockConnector::pairing("2@pairing-token"), RateLimits::default(), true);

    let (status, body) = app.get("/whatsapp/qr").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);

    let (status, _) = app.post("/whatsapp/initialize", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    let mut rx = app.manager.subscribe();
    tokio::time::timeout(
        Duration::from_secs(5),
        rx.wait_for(|s| s.pairing_token.is_some()),
    )
    .await
    .unwrap()
    .unwrap();

    let (status, body) = app
        .call(
            authed("GET", "/whatsapp/qr")
                .header(header::HOST, "gateway.local:3000")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["qrCodeText"], "2@pairing-token");
    assert!(body["qrCode"].as_str().unwrap().starts_with("data:image/png;base64,"));
    assert_eq!(
        body["qrImageURL"],
        "http://gateway.local:3000/api/notifications/whatsapp/qr/image"
    );

    let response = app
        .router
        .clone()
        .oneshot(authed("GET", "/whatsapp/qr/image").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    let png = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
}

#[tokio::test]
async fn multipart_upload_is_sent_as_image_bytes() {
    let app = app();
    let boundary = "notigate-boundary";
    let image = b"\x89PNG fake image bytes";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"phoneNumber\"\r\n\r\n081234567890\r\n\
             --{boundary}\r\nContent-Disposition: form-data; name=\"caption\"\r\n\r\nlook\r\n\
             --{boundary}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"a.png\"\r\nContent-Type: image/png\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(image);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    let (status, response) = app
        .call(
            authed("POST", "/whatsapp/send-image")
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{response}");

    let sent = app.connector.latest().await.unwrap().sent().await;
    assert_eq!(sent.len(), 1);
    match &sent[0].content {
        OutboundContent::Image {
            source: ImageSource::Bytes(bytes),
            caption,
        } => {
            assert_eq!(bytes.as_slice(), image);
            assert_eq!(caption, "look");
        }
        other => panic!("unexpected content {other:?}"),
    }
}

#[tokio::test]
async fn multipart_without_image_is_400() {
    let app = app();
    let boundary = "b";
    let body = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"phoneNumber\"\r\n\r\n081234567890\r\n--{boundary}--\r\n"
    );
    let (status, body) = app
        .call(
            authed("POST", "/whatsapp/send-image")
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("image"));
}

#[tokio::test]
async fn broadcast_list_lifecycle_over_http() {
    let app = app();
    let (status, body) = app
        .post(
            "/whatsapp/broadcast-list",
            json!({"name": "Customers", "recipients": ["081234567890", "081298765432"]}),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let id = body["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["recipientCount"], 2);

    let (status, body) = app
        .post("/whatsapp/broadcast-list/send", json!({"broadcastId": id, "message": "promo"}))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (status, body) = app
        .call(
            authed("DELETE", &format!("/whatsapp/broadcast-list/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["broadcastId"], id);
}

// --- Dual ---

#[tokio::test]
async fn dual_succeeds_when_one_channel_delivers() {
    let app = build(MockConnector::new(), RateLimits::default(), false);
    let (status, body) = app
        .post(
            "/send-dual",
            json!({
                "fcm": {"token": "device-1", "notification": notification()},
                "whatsapp": {"phoneNumber": "081234567890", "message": "hello"}
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["fcm"]["success"], true);
    assert_eq!(body["data"]["whatsapp"]["success"], false);
    assert_eq!(body["data"]["errors"][0]["service"], "whatsapp");
}

#[tokio::test]
async fn dual_fails_when_no_channel_delivers() {
    let app = build(MockConnector::new(), RateLimits::default(), false);
    app.push
        .fail_token("device-1", PushError::new(PushErrorCode::Unavailable, "down"))
        .await;
    let (status, body) = app
        .post(
            "/send-dual",
            json!({
                "fcm": {"token": "device-1", "notification": notification()},
                "whatsapp": {"phoneNumber": "081234567890", "message": "hello"}
            }),
        )
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert_eq!(body["data"]["errors"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn dual_requires_both_sections() {
    let app = app();
    let (status, _) = app
        .post("/send-dual", json!({"fcm": {"token": "d", "notification": notification()}}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
