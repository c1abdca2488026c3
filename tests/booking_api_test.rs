//! Booking API integration tests

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use court_booking::application::{BookingService, LifecyclePublisher};
use court_booking::config::{BookingSettings, TopicsConfig};
use court_booking::infrastructure::messaging::InMemoryEventChannel;
use court_booking::infrastructure::persistence::InMemoryBookingStore;
use court_booking::interface::api::{build_router, AppState};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt; // For `oneshot`

fn setup_api_test() -> (Router, InMemoryBookingStore) {
    let store = InMemoryBookingStore::new();
    let service = BookingService::new(
        Arc::new(store.clone()),
        LifecyclePublisher::new(Arc::new(InMemoryEventChannel::new()), TopicsConfig::default()),
        BookingSettings::default(),
    );
    let state = AppState {
        bookings: Arc::new(service),
    };
    (build_router(state, None), store)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    let request = match body {
        Some(body) => request.body(Body::from(body.to_string())).unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

fn create_body(court: &str, start: &str, end: &str) -> Value {
    json!({ "user_id": "u1", "court_id": court, "start_iso": start, "end_iso": end })
}

#[tokio::test]
async fn test_api_create_and_get_booking() {
    let (app, _store) = setup_api_test();

    let (status, json) = send(
        &app,
        "POST",
        "/bookings",
        Some(create_body("c1", "2025-03-01T10:00:00Z", "2025-03-01T11:00:00Z")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["status"], "PENDING");
    assert_eq!(json["data"]["court_id"], "c1");

    let id = json["data"]["id"].as_str().unwrap().to_string();
    let (status, json) = send(&app, "GET", &format!("/bookings/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["id"], id);
}

#[tokio::test]
async fn test_api_overlap_conflict() {
    let (app, store) = setup_api_test();

    send(
        &app,
        "POST",
        "/bookings",
        Some(create_body("c1", "2025-03-01T10:00:00Z", "2025-03-01T11:00:00Z")),
    )
    .await;
    let (status, json) = send(
        &app,
        "POST",
        "/bookings",
        Some(create_body("c1", "2025-03-01T10:30:00Z", "2025-03-01T11:30:00Z")),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["success"], false);
    assert!(json["error"].as_str().unwrap().contains("overlaps"));
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn test_api_bad_requests() {
    let (app, _store) = setup_api_test();

    let (status, _) = send(
        &app,
        "POST",
        "/bookings",
        Some(create_body("c1", "2025-03-01T11:00:00Z", "2025-03-01T10:00:00Z")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "POST",
        "/bookings",
        Some(create_body("c1", "tomorrow", "2025-03-01T10:00:00Z")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "GET", "/bookings?day=someday", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_api_not_found() {
    let (app, _store) = setup_api_test();

    let (status, json) = send(&app, "GET", "/bookings/00000000-0000-0000-0000-000000000000", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["success"], false);

    let (status, _) = send(&app, "POST", "/bookings/not-a-booking/confirm", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_api_confirm_and_cancel() {
    let (app, _store) = setup_api_test();

    let (_, json) = send(
        &app,
        "POST",
        "/bookings",
        Some(create_body("c1", "2025-03-01T10:00:00Z", "2025-03-01T11:00:00Z")),
    )
    .await;
    let id = json["data"]["id"].as_str().unwrap().to_string();

    let (status, json) = send(&app, "POST", &format!("/bookings/{}/confirm", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["status"], "CONFIRMED");

    let (status, json) = send(&app, "POST", &format!("/bookings/{}/cancel", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["status"], "CANCELLED");

    let (status, json) = send(&app, "POST", &format!("/bookings/{}/cancel", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["status"], "CANCELLED");

    let (status, _) = send(&app, "POST", &format!("/bookings/{}/confirm", id), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_api_list_bookings() {
    let (app, _store) = setup_api_test();

    for (court, start, end) in [
        ("c1", "2025-03-01T10:00:00Z", "2025-03-01T11:00:00Z"),
        ("c2", "2025-03-01T09:00:00Z", "2025-03-01T10:00:00Z"),
        ("c1", "2025-03-02T10:00:00Z", "2025-03-02T11:00:00Z"),
    ] {
        let (status, _) = send(&app, "POST", "/bookings", Some(create_body(court, start, end))).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, json) = send(&app, "GET", "/bookings?day=2025-03-01", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["total"], 2);
    assert_eq!(json["data"]["page"], 0);
    assert_eq!(json["data"]["page_size"], 20);
    assert_eq!(json["data"]["bookings"][0]["court_id"], "c2");

    let (_, json) = send(&app, "GET", "/bookings?court_id=c1&page_size=1&page=1", None).await;
    assert_eq!(json["data"]["total"], 2);
    assert_eq!(json["data"]["bookings"].as_array().unwrap().len(), 1);
    assert_eq!(json["data"]["bookings"][0]["start_time"], "2025-03-02T10:00:00Z");
}

#[tokio::test]
async fn test_api_health_check() {
    let (app, _store) = setup_api_test();

    let (status, json) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"], "OK");
}
