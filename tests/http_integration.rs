//! HTTP surface tests
//!
//! Drive the axum router in-process with `oneshot`, over a memory broker and
//! recording providers.

mod common;

use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use notification_dispatch_service::config::Settings;
use notification_dispatch_service::server::create_app;

use common::{request_body, test_app, test_app_with, TestApp, TOPIC};

fn router(app: &TestApp) -> Router {
    create_app(app.state.clone())
}

async fn post(router: Router, uri: &str, body: impl Into<Body>) -> (StatusCode, Value) {
    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(body.into())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn get(router: Router, uri: &str) -> (StatusCode, String) {
    let response = router
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

fn batch(bodies: &[String]) -> String {
    let records: Vec<Value> = bodies
        .iter()
        .enumerate()
        .map(|(i, body)| json!({ "messageId": format!("m-{i}"), "body": body }))
        .collect();
    json!({ "Records": records }).to_string()
}

#[tokio::test]
async fn test_publish_valid_request() {
    let app = test_app(Duration::from_secs(30));
    let body = r#"{"type":"sms","recipients":["+15551234567"],"message":"hi","sender":"ACME"}"#;

    let (status, value) = post(router(&app), "/api/v1/notifications", body).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(value, json!({ "message": "Notification sent" }));
    assert_eq!(app.broker.depth(TOPIC), 1);
}

#[tokio::test]
async fn test_publish_unknown_channel_is_rejected() {
    let app = test_app(Duration::from_secs(30));
    let body = r#"{"type":"fax","recipients":["x"],"message":"hi","sender":"A"}"#;

    let (status, value) = post(router(&app), "/api/v1/notifications", body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(value, json!({ "message": "Invalid input" }));
    assert_eq!(app.broker.depth(TOPIC), 0);
}

#[tokio::test]
async fn test_publish_missing_fields_is_rejected() {
    let app = test_app(Duration::from_secs(30));

    for body in [
        r#"{"type":"sms","recipients":[],"message":"hi","sender":"A"}"#,
        r#"{"type":"sms","recipients":["+1"],"message":"","sender":"A"}"#,
        r#"{"type":"email","recipients":["a@x.com"],"message":"hi"}"#,
        "null",
    ] {
        let (status, value) = post(router(&app), "/api/v1/notifications", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body: {body}");
        assert_eq!(value["message"], "Invalid input");
    }
    assert_eq!(app.broker.depth(TOPIC), 0);
}

#[tokio::test]
async fn test_publish_malformed_json_is_internal_error() {
    let app = test_app(Duration::from_secs(30));

    let (status, value) = post(router(&app), "/api/v1/notifications", "{not json").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(value, json!({ "message": "Internal server error" }));
}

#[tokio::test]
async fn test_process_batch() {
    let app = test_app(Duration::from_secs(30));
    let body = batch(&[
        request_body("email", &["a@x.com", "b@x.com"]),
        request_body("sms", &["+1"]),
    ]);

    let (status, value) = post(router(&app), "/api/v1/notifications/process", body).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(value, json!({ "message": "Notifications processed" }));
    assert_eq!(app.email.destinations(), vec!["a@x.com", "b@x.com"]);
    assert_eq!(app.sms.destinations(), vec!["+1"]);
}

#[tokio::test]
async fn test_process_batch_with_failed_delivery() {
    let app = test_app(Duration::from_secs(30));
    app.email.fail("b@x.com", 1);
    let body = batch(&[
        request_body("email", &["a@x.com", "b@x.com"]),
        request_body("sms", &["+1"]),
    ]);

    let (status, value) = post(router(&app), "/api/v1/notifications/process", body).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(value, json!({ "message": "Internal server error" }));
    // The second record never ran
    assert!(app.sms.destinations().is_empty());
}

#[tokio::test]
async fn test_process_invalid_envelope_is_internal_error() {
    let app = test_app(Duration::from_secs(30));

    let (status, value) =
        post(router(&app), "/api/v1/notifications/process", r#"{"Records": 5}"#).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(value["message"], "Internal server error");
}

#[tokio::test]
async fn test_process_envelope_without_records_is_internal_error() {
    let app = test_app(Duration::from_secs(30));

    for body in ["{}", r#"{"foo":1}"#] {
        let (status, value) = post(router(&app), "/api/v1/notifications/process", body).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "body: {body}");
        assert_eq!(value["message"], "Internal server error");
    }
    assert_eq!(app.state.dispatcher.stats().batches_processed, 0);
}

#[tokio::test]
async fn test_process_record_without_type_is_skipped() {
    let app = test_app(Duration::from_secs(30));
    let body = batch(&[
        r#"{"type":null,"recipients":["+9"],"message":"hi","sender":"A"}"#.to_string(),
        request_body("sms", &["+1"]),
    ]);

    let (status, value) = post(router(&app), "/api/v1/notifications/process", body).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(value, json!({ "message": "Notifications processed" }));
    assert_eq!(app.sms.destinations(), vec!["+1"]);
}

#[tokio::test]
async fn test_oversized_body_is_refused() {
    let mut settings = Settings::with_topic(TOPIC);
    settings.server.body_limit_bytes = 64;
    let app = test_app_with(settings, Duration::from_secs(30));

    let message = "x".repeat(256);
    let body = json!({
        "type": "sms",
        "recipients": ["+1"],
        "message": message,
        "sender": "A",
    })
    .to_string();

    let response = router(&app)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/notifications")
                .header("content-type", "application/json")
                .header("content-length", body.len())
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(app.broker.depth(TOPIC), 0);
}

#[tokio::test]
async fn test_health_and_stats() {
    let app = test_app(Duration::from_secs(30));

    let (status, body) = get(router(&app), "/health").await;
    assert_eq!(status, StatusCode::OK);
    let health: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["broker"]["backend"], "memory");
    assert_eq!(health["broker"]["topic"], TOPIC);
    assert!(health.get("redis").is_none());

    let (status, body) = get(router(&app), "/stats").await;
    assert_eq!(status, StatusCode::OK);
    let stats: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(stats["dispatcher"]["batches_processed"], 0);
    assert_eq!(stats["consumer"]["batches_received"], 0);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = test_app(Duration::from_secs(30));
    let body = r#"{"type":"sms","recipients":["+1"],"message":"hi","sender":"A"}"#;
    post(router(&app), "/api/v1/notifications", body).await;

    let (status, body) = get(router(&app), "/metrics").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("notify_requests_total"));
    assert!(body.contains("notify_publishes_total"));
}
