//! Requests through the full router, JSON in and out

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use courier_api::{AppState, HealthChecker, router};
use courier_delivery::{DispatchPublisher, MemoryTransport, NotificationService, TransportConfig};
use courier_store::TestNotificationStore;
use serde_json::{Value, json};
use tower::ServiceExt;

fn app() -> Router {
    let transport = Arc::new(MemoryTransport::new(TransportConfig::default()));
    let service = NotificationService::new(
        Arc::new(TestNotificationStore::new()),
        DispatchPublisher::new(transport),
    );

    router(AppState {
        service: Arc::new(service),
        health: Arc::new(HealthChecker::new()),
        max_page_size: 50,
    })
}

async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn post(body: &str) -> Request<Body> {
    Request::post("/api/v1/notifications")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn created_notification_can_be_fetched() {
    let app = app();

    let (status, created) = call(
        &app,
        post(
            &json!({
                "channel": "EMAIL",
                "recipient": "user@example.com",
                "subject": "Welcome",
                "content": "Hello there",
                "metadata": { "campaign": "onboarding" }
            })
            .to_string(),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(created["status"], "QUEUED");
    assert_eq!(created["channel"], "EMAIL");
    assert_eq!(created["metadata"]["campaign"], "onboarding");
    assert!(created.get("attempts").is_none());

    let id = created["id"].as_str().unwrap();
    assert_eq!(created["tracking_url"], format!("/api/v1/notifications/{id}"));

    let (status, fetched) = call(&app, get(&format!("/api/v1/notifications/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["id"], id);
    assert_eq!(fetched["attempts"], json!([]));

    let (status, brief) = call(&app, get(&format!("/api/v1/notifications/{id}/status"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(brief["status"], "QUEUED");
    assert_eq!(brief["failure_reason"], Value::Null);
}

#[tokio::test]
async fn missing_channel_is_a_validation_error() {
    let app = app();

    let (status, body) = call(
        &app,
        post(r#"{"recipient":"user@example.com","content":"hi"}"#),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);
    assert_eq!(body["error"], "Bad Request");
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert_eq!(body["path"], "/api/v1/notifications");
    assert!(body["details"]["channel"].is_string());
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn oversized_fields_are_reported_per_field() {
    let app = app();

    let (status, body) = call(
        &app,
        post(
            &json!({
                "channel": "SMS",
                "recipient": "x".repeat(256),
                "subject": "s".repeat(501),
                "content": "c".repeat(10_001),
            })
            .to_string(),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let details = body["details"].as_object().unwrap();
    assert_eq!(details.len(), 3);
    assert!(details.contains_key("recipient"));
    assert!(details.contains_key("subject"));
    assert!(details.contains_key("content"));
}

#[tokio::test]
async fn malformed_json_is_rejected() {
    let app = app();

    let (status, body) = call(&app, post("{not json")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_JSON");
}

#[tokio::test]
async fn unknown_notification_is_not_found() {
    let app = app();

    let (status, body) = call(
        &app,
        get("/api/v1/notifications/01ARZ3NDEKTSV4RRFFQ69G5FAV"),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "RESOURCE_NOT_FOUND");
}

#[tokio::test]
async fn listing_is_paged_and_clamped() {
    let app = app();
    for i in 0..3 {
        let (status, _) = call(
            &app,
            post(&json!({ "channel": "CONSOLE", "recipient": "ops", "content": format!("#{i}") }).to_string()),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
    }

    let (status, page) = call(&app, get("/api/v1/notifications?page=0&size=2")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 3);
    assert_eq!(page["items"].as_array().unwrap().len(), 2);
    assert_eq!(page["total_pages"], 2);

    let (_, page) = call(&app, get("/api/v1/notifications?size=500")).await;
    assert_eq!(page["size"], 50);

    let (_, page) = call(&app, get("/api/v1/notifications?status=delivered")).await;
    assert_eq!(page["total"], 0);

    let (status, body) = call(&app, get("/api/v1/notifications?page=first")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_PARAMETER");
}

#[tokio::test]
async fn readiness_reports_components() {
    let app = app();

    let (status, _) = call(&app, get("/health/live")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(&app, get("/health/ready")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["store_ready"], false);
    assert_eq!(body["delivery_ready"], false);
}
