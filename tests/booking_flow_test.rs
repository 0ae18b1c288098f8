//! End-to-end booking and payment flow through the HTTP surface.

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use tower::ServiceExt;

use innkeeper::booking::{BookingAllocator, InMemoryBookingStore};
use innkeeper::catalog::InMemoryHotelStore;
use innkeeper::gateway::{CheckoutBroker, CheckoutConfig, WebhookVerifier};
use innkeeper::http::{AppState, PaymentsContext, router};
use innkeeper::reconcile::ReconciliationEngine;
use innkeeper::testing::{self, MockCheckoutClient};

const SECRET: &str = "whsec_test_secret";

struct TestApp {
    app: Router,
    gateway: Arc<MockCheckoutClient>,
}

fn test_app() -> TestApp {
    let bookings = InMemoryBookingStore::new();
    let hotels = InMemoryHotelStore::new();
    hotels.insert(testing::hotel_with_plan("hotel_1")).unwrap();
    hotels.insert(testing::hotel_without_plan("hotel_2")).unwrap();

    let gateway = Arc::new(MockCheckoutClient::new());
    let allocator = Arc::new(BookingAllocator::new(bookings.clone(), hotels.clone()));
    let broker = Arc::new(CheckoutBroker::new(
        bookings.clone(),
        hotels.clone(),
        gateway.clone(),
        CheckoutConfig::default(),
    ));
    let engine = Arc::new(ReconciliationEngine::new(
        bookings.clone(),
        hotels.clone(),
        gateway.clone(),
        Some(WebhookVerifier::new(SECRET)),
    ));

    let state = AppState::new(allocator, bookings, hotels)
        .with_payments(PaymentsContext { broker, engine });

    TestApp {
        app: router(state),
        gateway,
    }
}

fn booking_only_app() -> Router {
    let bookings = InMemoryBookingStore::new();
    let hotels = InMemoryHotelStore::new();
    hotels.insert(testing::hotel_with_plan("hotel_1")).unwrap();
    let allocator = Arc::new(BookingAllocator::new(bookings.clone(), hotels.clone()));
    let state: AppState<_, _, MockCheckoutClient> =
        AppState::new(allocator, bookings, hotels);
    router(state)
}

fn future_date(days: i64) -> String {
    (chrono::Utc::now().date_naive() + chrono::Duration::days(days))
        .format("%Y-%m-%d")
        .to_string()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

fn json_post(uri: &str, user: Option<&str>, body: serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(user) = user {
        builder = builder.header("x-user-id", user);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get_request(uri: &str, user: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(user) = user {
        builder = builder.header("x-user-id", user);
    }
    builder.body(Body::empty()).unwrap()
}

fn webhook_request(body: Vec<u8>, signature: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/payments/webhook")
        .header("stripe-signature", signature)
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_full_booking_and_payment_flow() {
    let t = test_app();

    // Book a three-night stay.
    let (status, body) = send(
        &t.app,
        json_post(
            "/api/bookings",
            Some("user_1"),
            serde_json::json!({
                "hotel_id": "hotel_1",
                "check_in": future_date(1),
                "check_out": future_date(4),
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["booking"]["room_number"], 101);
    assert_eq!(body["booking"]["total_cents"], 30_000);
    assert_eq!(body["booking"]["payment_status"], "PENDING");
    let booking_id = body["booking"]["id"].as_str().unwrap().to_string();

    // Open a checkout session for it.
    let (status, body) = send(
        &t.app,
        json_post(
            "/api/payments/checkout-session",
            Some("user_1"),
            serde_json::json!({"booking_id": booking_id}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["client_secret"].as_str().unwrap().ends_with("_secret"));

    // Customer pays, gateway delivers the webhook.
    let session_id = t.gateway.last_session_id().unwrap();
    t.gateway
        .complete_session_with_email(&session_id, "guest@example.com");
    let event = testing::completed_event_body(&session_id);
    let signature = testing::signed_webhook_header(SECRET, &event);

    let (status, body) = send(&t.app, webhook_request(event.clone(), &signature)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["received"], true);

    // The return page polls the session status and sees the paid booking.
    let (status, body) = send(
        &t.app,
        get_request(
            &format!("/api/payments/session-status?session_id={session_id}"),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["session_status"], "complete");
    assert_eq!(body["customer_email"], "guest@example.com");
    assert_eq!(body["booking"]["payment_status"], "PAID");
    assert_eq!(body["hotel"]["name"], "Harbor View");

    // A duplicate webhook delivery is acknowledged without complaint.
    let (status, _) = send(&t.app, webhook_request(event, &signature)).await;
    assert_eq!(status, StatusCode::OK);

    // The booking list reflects the paid stay, with the hotel joined in.
    let (status, body) = send(&t.app, get_request("/api/bookings/user", Some("user_1"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["payment_status"], "PAID");
    assert_eq!(body[0]["hotel"]["name"], "Harbor View");
    assert_eq!(body[0]["hotel"]["price_cents"], 10_000);
}

#[tokio::test]
async fn test_booking_requires_auth() {
    let t = test_app();
    let (status, _) = send(
        &t.app,
        json_post(
            "/api/bookings",
            None,
            serde_json::json!({
                "hotel_id": "hotel_1",
                "check_in": future_date(1),
                "check_out": future_date(2),
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unknown_hotel_is_404() {
    let t = test_app();
    let (status, _) = send(
        &t.app,
        json_post(
            "/api/bookings",
            Some("user_1"),
            serde_json::json!({
                "hotel_id": "hotel_missing",
                "check_in": future_date(1),
                "check_out": future_date(2),
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_bad_dates_are_400() {
    let t = test_app();
    let (status, body) = send(
        &t.app,
        json_post(
            "/api/bookings",
            Some("user_1"),
            serde_json::json!({
                "hotel_id": "hotel_1",
                "check_in": future_date(4),
                "check_out": future_date(1),
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("check-out"));
}

#[tokio::test]
async fn test_checkout_for_other_users_booking_is_403() {
    let t = test_app();
    let (_, body) = send(
        &t.app,
        json_post(
            "/api/bookings",
            Some("user_1"),
            serde_json::json!({
                "hotel_id": "hotel_1",
                "check_in": future_date(1),
                "check_out": future_date(2),
            }),
        ),
    )
    .await;
    let booking_id = body["booking"]["id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &t.app,
        json_post(
            "/api/payments/checkout-session",
            Some("user_2"),
            serde_json::json!({"booking_id": booking_id}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_tampered_webhook_is_400() {
    let t = test_app();
    let event = testing::completed_event_body("cs_test_1");
    let signature = testing::signed_webhook_header("whsec_wrong_secret", &event);

    let (status, _) = send(&t.app, webhook_request(event, &signature)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_webhook_without_signature_header_is_400() {
    let t = test_app();
    let request = Request::builder()
        .method("POST")
        .uri("/api/payments/webhook")
        .body(Body::from(testing::completed_event_body("cs_test_1")))
        .unwrap();
    let (status, _) = send(&t.app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unrelated_webhook_event_is_acknowledged() {
    let t = test_app();
    let event = serde_json::json!({
        "id": "evt_other",
        "type": "customer.created",
        "data": {"object": {"id": "cus_1"}}
    })
    .to_string()
    .into_bytes();
    let signature = testing::signed_webhook_header(SECRET, &event);

    let (status, body) = send(&t.app, webhook_request(event, &signature)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["received"], true);
}

#[tokio::test]
async fn test_session_status_requires_session_id() {
    let t = test_app();
    let (status, _) = send(&t.app, get_request("/api/payments/session-status", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_payment_routes_without_gateway_are_400() {
    let app = booking_only_app();
    let (status, body) = send(
        &app,
        json_post(
            "/api/payments/checkout-session",
            Some("user_1"),
            serde_json::json!({"booking_id": "b1"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("Configuration"));
}

#[tokio::test]
async fn test_health() {
    let t = test_app();
    let (status, body) = send(&t.app, get_request("/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}
