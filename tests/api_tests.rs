//! HTTP surface tests driving the router in-process

mod common;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use common::{Harness, HarnessOptions, SESSION_SECRET};
use rental_handoff::auth::generate_session_token;
use rental_handoff::booking::BookingStatus;
use rental_handoff::middleware::RateLimiter;
use rental_handoff::routes::api_router;

fn router(h: &Harness) -> Router {
    api_router(
        h.state.clone(),
        RateLimiter::new("global", 1000),
        RateLimiter::with_burst("collect", 100.0, 100.0),
    )
}

fn bearer(user_id: Uuid) -> String {
    let token = generate_session_token(user_id, None, SESSION_SECRET, 900).unwrap();
    format!("Bearer {}", token)
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    user: Option<Uuid>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header(header::AUTHORIZATION, bearer(user));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn test_health_reports_in_memory_sandbox() {
    let h = Harness::new();
    let app = router(&h);

    let response = app
        .clone()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("x-content-type-options").unwrap(),
        "nosniff"
    );

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], "in-memory");
    assert_eq!(body["settlement"], "sandbox");
}

#[tokio::test]
async fn test_missing_session_is_unauthenticated() {
    let h = Harness::new();
    let app = router(&h);

    let (status, body) = send(&app, "GET", "/api/bookings", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHENTICATED");

    let response = app
        .clone()
        .oneshot(
            Request::get("/api/bookings")
                .header(header::AUTHORIZATION, "Bearer garbage")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unknown_fields_are_validation_errors() {
    let h = Harness::new();
    let app = router(&h);

    let (status, body) = send(
        &app,
        "POST",
        "/api/bookings",
        Some(h.borrower),
        Some(json!({
            "productId": 1,
            "startDate": "2026-09-01",
            "endDate": "2026-09-02",
            "totalAmount": 1
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, body) = send(
        &app,
        "GET",
        "/api/bookings/1/qr?flow=teleport",
        Some(h.lender),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_rental_flow_over_http() {
    let h = Harness::new();
    let app = router(&h);

    let (status, body) = send(
        &app,
        "POST",
        "/api/bookings",
        Some(h.borrower),
        Some(json!({ "productId": 1, "startDate": "2026-09-01", "endDate": "2026-09-03" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "pending");
    assert!(body["data"].get("collection_token_hash").is_none());
    let id = body["data"]["booking_id"].as_i64().unwrap();

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/bookings/{}/approve", id),
        Some(h.lender),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, session) = send(
        &app,
        "POST",
        "/api/stripe/create-checkout-session",
        Some(h.borrower),
        Some(json!({ "productId": 1, "bookingId": id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["fee"]["platformFee"], 100);
    assert_eq!(session["isDummy"], true);

    let (status, body) = send(
        &app,
        "POST",
        "/api/bookings/update-payment-status",
        Some(h.borrower),
        Some(json!({ "bookingId": id, "sessionId": session["sessionId"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "paid");

    let (status, qr) = send(
        &app,
        "GET",
        &format!("/api/bookings/{}/qr?flow=borrow", id),
        Some(h.lender),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(qr["bookingId"], id);
    assert_eq!(qr["flow"], "borrow");

    let (status, body) = send(
        &app,
        "POST",
        "/api/bookings/collect",
        Some(h.borrower),
        Some(json!({ "token": qr["token"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["booking"]["status"], "active");

    let (status, body) = send(
        &app,
        "POST",
        "/api/bookings/collect",
        Some(h.borrower),
        Some(json!({ "token": qr["token"] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_TOKEN");
}

#[tokio::test]
async fn test_scan_by_lender_is_forbidden() {
    let h = Harness::new();
    h.seed(1, BookingStatus::Paid);
    let app = router(&h);

    let (_, qr) = send(&app, "GET", "/api/bookings/1/qr", Some(h.lender), None).await;
    let (status, body) = send(
        &app,
        "POST",
        "/api/bookings/collect",
        Some(h.lender),
        Some(json!({ "token": qr["token"] })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let (status, _) = send(
        &app,
        "POST",
        "/api/bookings/collect",
        Some(h.borrower),
        Some(json!({ "token": "  " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unonboarded_seller_flags_needs_connect() {
    let (h, _) = Harness::with_options(HarnessOptions {
        lender_onboarded: false,
        ..Default::default()
    });
    h.seed(1, BookingStatus::Confirmed);
    let app = router(&h);

    let (status, body) = send(
        &app,
        "POST",
        "/api/stripe/create-checkout-session",
        Some(h.borrower),
        Some(json!({ "productId": 1, "bookingId": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "SELLER_NOT_ONBOARDED");
    assert_eq!(body["needsConnect"], true);

    let (status, body) = send(&app, "POST", "/api/stripe/connect", Some(h.lender), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["accountId"].as_str().unwrap().starts_with("acct_dummy_"));

    let (status, _) = send(
        &app,
        "POST",
        "/api/stripe/create-checkout-session",
        Some(h.borrower),
        Some(json!({ "productId": 1, "bookingId": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_strangers_see_not_found() {
    let h = Harness::new();
    h.seed(1, BookingStatus::Pending);
    let app = router(&h);

    let (status, body) = send(&app, "GET", "/api/bookings/1", Some(Uuid::new_v4()), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}
