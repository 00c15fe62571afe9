//! Order creation: validation, gateway order, payment record

#[path = "../common/mod.rs"]
mod common;

use axum::http::StatusCode;
use common::*;
use serde_json::json;

#[tokio::test]
async fn test_create_order_happy_path() {
    let app = create_test_app().await;
    let mock = app.gateway.clone().unwrap();

    let (status, body) = send(app.router(), post_json("/payments/orders", &order_request_body(), None)).await;

    assert_eq!(status, StatusCode::OK, "body: {}", body);
    assert_eq!(body["amount"], 1_500_050);
    assert_eq!(body["currency"], "INR");
    assert_eq!(body["key"], KEY_ID);
    let order_id = body["orderId"].as_str().unwrap().to_string();
    let booking_id = body["bookingId"].as_str().unwrap().to_string();
    assert!(order_id.starts_with("order_mock"));
    assert!(booking_id.starts_with("tp_bkg_"));

    // Gateway saw minor units, the booking as receipt, basic auth
    let requests = mock.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].path, "/orders");
    assert_eq!(requests[0].body["amount"], 1_500_050);
    assert_eq!(requests[0].body["currency"], "INR");
    assert_eq!(requests[0].body["receipt"], booking_id.as_str());
    assert_eq!(requests[0].body["notes"]["user_id"], "user_42");
    assert!(requests[0].authorization.as_deref().unwrap().starts_with("Basic "));

    app.with_conn(|conn| {
        let booking = queries::get_booking(conn, &booking_id).unwrap().unwrap();
        assert_eq!(booking.status, BookingStatus::PendingPayment);
        assert_eq!(booking.payment_status, BookingPaymentStatus::Pending);
        assert_eq!(booking.order_id.as_deref(), Some(order_id.as_str()));
        assert_eq!(booking.user_id, "user_42");
        assert_eq!(booking.participants, 2);

        let payment = queries::get_payment(conn, &order_id).unwrap().unwrap();
        assert_eq!(payment.status, PaymentStatus::Created);
        assert_eq!(payment.booking_id, booking_id);
        assert_eq!(payment.amount, 1_500_050);
        assert_eq!(payment.currency, "INR");
    });
}

#[tokio::test]
async fn test_create_order_rejects_invalid_booking() {
    let app = create_test_app().await;
    let mock = app.gateway.clone().unwrap();

    let cases = [
        ("/userId", json!("")),
        ("/bookingData/customerEmail", json!("not-an-email")),
        ("/bookingData/participants", json!(0)),
        ("/bookingData/totalAmount", json!(0)),
        ("/bookingData/totalAmount", json!(-250.0)),
        ("/bookingData/endDate", json!("2026-11-01")),
        ("/bookingData/customerName", json!("  ")),
    ];

    for (pointer, value) in cases {
        let mut body = order_request_body();
        *body.pointer_mut(pointer).unwrap() = value.clone();

        let (status, resp) = send(app.router(), post_json("/payments/orders", &body, None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{} = {} should be rejected", pointer, value);
        assert_eq!(resp["code"], "invalid-argument");
    }

    assert!(mock.requests().is_empty(), "no gateway call for invalid input");
}

#[tokio::test]
async fn test_create_order_rejects_malformed_fields() {
    let app = create_test_app().await;

    let mut body = order_request_body();
    body["bookingData"]["startDate"] = json!("03/11/2026");
    let (status, resp) = send(app.router(), post_json("/payments/orders", &body, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(resp["code"], "invalid-argument");

    let mut body = order_request_body();
    body["bookingData"].as_object_mut().unwrap().remove("pickupLocation");
    let (status, resp) = send(app.router(), post_json("/payments/orders", &body, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(resp["code"], "invalid-argument");

    let mut body = order_request_body();
    body["bookingData"]["participants"] = json!(-1);
    let (status, _) = send(app.router(), post_json("/payments/orders", &body, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_order_without_gateway_config() {
    let app = create_unconfigured_test_app();

    let (status, body) = send(app.router(), post_json("/payments/orders", &order_request_body(), None)).await;

    assert_eq!(status, StatusCode::PRECONDITION_FAILED);
    assert_eq!(body["code"], "failed-precondition");

    let bookings: i64 = app.with_conn(|conn| {
        conn.query_row("SELECT COUNT(*) FROM bookings", [], |r| r.get(0)).unwrap()
    });
    assert_eq!(bookings, 0, "no booking written without gateway credentials");
}

#[tokio::test]
async fn test_create_order_gateway_unreachable() {
    let app = create_test_app_unreachable_gateway();

    let (status, body) = send(app.router(), post_json("/payments/orders", &order_request_body(), None)).await;

    assert_eq!(status, StatusCode::PRECONDITION_FAILED);
    assert_eq!(body["code"], "failed-precondition");

    // Booking stays pending with no order, and there is no payment
    app.with_conn(|conn| {
        let (status, order_id): (String, Option<String>) = conn
            .query_row("SELECT status, order_id FROM bookings", [], |r| Ok((r.get(0)?, r.get(1)?)))
            .unwrap();
        assert_eq!(status, "pending_payment");
        assert!(order_id.is_none());

        let payments: i64 = conn.query_row("SELECT COUNT(*) FROM payments", [], |r| r.get(0)).unwrap();
        assert_eq!(payments, 0);
    });
}

#[tokio::test]
async fn test_create_order_gateway_rejects() {
    let app = create_test_app().await;
    app.gateway.as_ref().unwrap().fail_with(400);

    let (status, body) = send(app.router(), post_json("/payments/orders", &order_request_body(), None)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "internal");
    // Gateway error text is not leaked
    assert!(body.get("details").is_none());
}

#[tokio::test]
async fn test_health() {
    let app = create_unconfigured_test_app();
    let request = axum::http::Request::builder()
        .uri("/health")
        .body(axum::body::Body::empty())
        .unwrap();

    let (status, body) = send(app.router(), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}
