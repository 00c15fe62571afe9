//! Gateway webhook: signature check, dedup, transitions, notices

#[path = "../common/mod.rs"]
mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::*;
use serde_json::json;

fn webhook_app_with_order(order_id: &str) -> (TestApp, Booking) {
    let app = create_test_app_unreachable_gateway();
    let (booking, _) = app.with_conn(|conn| create_test_booking_with_order(conn, order_id));
    (app, booking)
}

fn raw_webhook(body: &[u8], signature: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/payments/webhook")
        .header("content-type", "application/json");
    if let Some(sig) = signature {
        builder = builder.header("x-gateway-signature", sig);
    }
    builder.body(Body::from(body.to_vec())).unwrap()
}

fn count_events(app: &TestApp) -> i64 {
    app.with_conn(|conn| {
        conn.query_row("SELECT COUNT(*) FROM processed_events", [], |r| r.get(0))
            .unwrap()
    })
}

// ============ Authentication ============

#[tokio::test]
async fn test_missing_signature_rejected() {
    let (app, booking) = webhook_app_with_order("order_1");
    let body = serde_json::to_vec(&captured_event("evt_1", "order_1", "pay_1")).unwrap();

    let (status, _) = send(app.router(), raw_webhook(&body, None)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    app.with_conn(|conn| {
        let b = queries::get_booking(conn, &booking.id).unwrap().unwrap();
        assert_eq!(b.status, BookingStatus::PendingPayment);
    });
    assert_eq!(count_events(&app), 0);
}

#[tokio::test]
async fn test_invalid_signature_rejected_without_mutation() {
    let (mut app, booking) = webhook_app_with_order("order_1");
    let body = serde_json::to_vec(&captured_event("evt_1", "order_1", "pay_1")).unwrap();
    let forged = hmac_sha256_hex(b"some_other_secret", &body);

    let (status, _) = send(app.router(), raw_webhook(&body, Some(&forged))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    app.with_conn(|conn| {
        let b = queries::get_booking(conn, &booking.id).unwrap().unwrap();
        assert_eq!(b.status, BookingStatus::PendingPayment);
        assert_eq!(b.payment_status, BookingPaymentStatus::Pending);
        let p = queries::get_payment(conn, "order_1").unwrap().unwrap();
        assert_eq!(p.status, PaymentStatus::Created);
    });
    assert_eq!(count_events(&app), 0, "rejected events are not recorded");
    assert!(app.drain_notices().is_empty());
}

#[tokio::test]
async fn test_tampered_body_rejected() {
    let (app, _) = webhook_app_with_order("order_1");
    let body = serde_json::to_vec(&captured_event("evt_1", "order_1", "pay_1")).unwrap();
    let signature = sign_webhook(&body);
    let tampered = serde_json::to_vec(&captured_event("evt_1", "order_1", "pay_evil")).unwrap();

    let (status, _) = send(app.router(), raw_webhook(&tampered, Some(&signature))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_webhook_secret_not_configured() {
    let app = create_unconfigured_test_app();
    let event = captured_event("evt_1", "order_1", "pay_1");

    let (status, _) = send(app.router(), webhook_request(&event)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(count_events(&app), 0);
}

#[tokio::test]
async fn test_empty_body_rejected() {
    let app = create_test_app_unreachable_gateway();
    let (status, _) = send(app.router(), raw_webhook(b"", Some(&sign_webhook(b"")))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_signed_garbage_rejected() {
    let app = create_test_app_unreachable_gateway();
    let body = b"not json at all";
    let (status, _) = send(app.router(), raw_webhook(body, Some(&sign_webhook(body)))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ============ Capture ============

#[tokio::test]
async fn test_capture_confirms_booking_and_queues_notice() {
    let (mut app, booking) = webhook_app_with_order("order_1");

    let (status, body) = send(
        app.router(),
        webhook_request(&captured_event("evt_1", "order_1", "pay_1")),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");

    app.with_conn(|conn| {
        let p = queries::get_payment(conn, "order_1").unwrap().unwrap();
        assert_eq!(p.status, PaymentStatus::Captured);
        assert_eq!(p.payment_id.as_deref(), Some("pay_1"));

        let b = queries::get_booking(conn, &booking.id).unwrap().unwrap();
        assert_eq!(b.status, BookingStatus::Confirmed);
        assert_eq!(b.payment_status, BookingPaymentStatus::Captured);
        assert_eq!(b.payment_id.as_deref(), Some("pay_1"));
        assert!(b.confirmed_at.is_some());

        let event = queries::get_processed_event(conn, "evt_1").unwrap().unwrap();
        assert_eq!(event.event_type, "payment.captured");
    });

    let notices = app.drain_notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].booking.id, booking.id);
    assert_eq!(notices[0].payment.id, "order_1");
}

#[tokio::test]
async fn test_duplicate_event_is_already_processed() {
    let (mut app, _) = webhook_app_with_order("order_1");
    let event = captured_event("evt_1", "order_1", "pay_1");

    let (status, body) = send(app.router(), webhook_request(&event)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");

    let (status, body) = send(app.router(), webhook_request(&event)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "already_processed");

    assert_eq!(app.drain_notices().len(), 1, "exactly one confirmation");
    assert_eq!(count_events(&app), 1);
}

#[tokio::test]
async fn test_duplicate_order_paid_is_already_processed() {
    let (mut app, booking) = webhook_app_with_order("order_1");
    let event = order_paid_event("evt_1", "order_1", "pay_1");

    let (_, body) = send(app.router(), webhook_request(&event)).await;
    assert_eq!(body["status"], "success");
    let updated_at = app.with_conn(|conn| queries::get_payment(conn, "order_1").unwrap().unwrap().updated_at);

    let (status, body) = send(app.router(), webhook_request(&event)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "already_processed");

    app.with_conn(|conn| {
        let p = queries::get_payment(conn, "order_1").unwrap().unwrap();
        assert_eq!(p.status, PaymentStatus::Captured);
        assert_eq!(p.updated_at, updated_at);
        let b = queries::get_booking(conn, &booking.id).unwrap().unwrap();
        assert_eq!(b.status, BookingStatus::Confirmed);
    });
    assert_eq!(app.drain_notices().len(), 1);
    assert_eq!(count_events(&app), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_duplicate_deliveries_notify_once() {
    let mut app = create_file_backed_test_app();
    app.with_conn(|conn| create_test_booking_with_order(conn, "order_1"));
    let event = captured_event("evt_1", "order_1", "pay_1");

    let first = tokio::spawn(send(app.router(), webhook_request(&event)));
    let second = tokio::spawn(send(app.router(), webhook_request(&event)));
    let (s1, b1) = first.await.unwrap();
    let (s2, b2) = second.await.unwrap();

    assert_eq!(s1, StatusCode::OK);
    assert_eq!(s2, StatusCode::OK);
    let mut outcomes = vec![
        b1["status"].as_str().unwrap().to_string(),
        b2["status"].as_str().unwrap().to_string(),
    ];
    outcomes.sort();
    assert_eq!(outcomes, ["already_processed", "success"]);
    assert_eq!(app.drain_notices().len(), 1);
    assert_eq!(count_events(&app), 1);
}

#[tokio::test]
async fn test_distinct_capture_events_notify_once() {
    let (mut app, _) = webhook_app_with_order("order_1");

    send(app.router(), webhook_request(&captured_event("evt_1", "order_1", "pay_1"))).await;
    let (status, body) = send(
        app.router(),
        webhook_request(&order_paid_event("evt_2", "order_1", "pay_1")),
    )
    .await;

    // New event ID, but the capture already happened
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(app.drain_notices().len(), 1);
    assert_eq!(count_events(&app), 2);
}

#[tokio::test]
async fn test_order_paid_confirms_booking() {
    let (mut app, booking) = webhook_app_with_order("order_7");

    let (status, _) = send(
        app.router(),
        webhook_request(&order_paid_event("evt_7", "order_7", "pay_7")),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    app.with_conn(|conn| {
        let b = queries::get_booking(conn, &booking.id).unwrap().unwrap();
        assert_eq!(b.status, BookingStatus::Confirmed);
        assert_eq!(b.payment_id.as_deref(), Some("pay_7"));
    });
    assert_eq!(app.drain_notices().len(), 1);
}

#[tokio::test]
async fn test_capture_for_unknown_order_is_integrity_error() {
    let mut app = create_test_app_unreachable_gateway();

    let (status, _) = send(
        app.router(),
        webhook_request(&captured_event("evt_x", "order_missing", "pay_x")),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(app.drain_notices().is_empty());
}

#[tokio::test]
async fn test_event_id_from_header() {
    let (app, _) = webhook_app_with_order("order_1");
    let mut event = captured_event("ignored", "order_1", "pay_1");
    event.as_object_mut().unwrap().remove("id");
    let body = serde_json::to_vec(&event).unwrap();

    let request = Request::builder()
        .method("POST")
        .uri("/payments/webhook")
        .header("x-gateway-signature", sign_webhook(&body))
        .header("x-gateway-event-id", "evt_from_header")
        .body(Body::from(body.clone()))
        .unwrap();
    let (status, _) = send(app.router(), request).await;
    assert_eq!(status, StatusCode::OK);

    app.with_conn(|conn| {
        assert!(queries::get_processed_event(conn, "evt_from_header").unwrap().is_some());
    });

    // Same header again is a duplicate
    let request = Request::builder()
        .method("POST")
        .uri("/payments/webhook")
        .header("x-gateway-signature", sign_webhook(&body))
        .header("x-gateway-event-id", "evt_from_header")
        .body(Body::from(body))
        .unwrap();
    let (_, resp) = send(app.router(), request).await;
    assert_eq!(resp["status"], "already_processed");
}

#[tokio::test]
async fn test_missing_event_id_rejected() {
    let (app, _) = webhook_app_with_order("order_1");
    let mut event = captured_event("x", "order_1", "pay_1");
    event.as_object_mut().unwrap().remove("id");

    let (status, _) = send(app.router(), webhook_request(&event)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(count_events(&app), 0);
}

// ============ Failure ============

#[tokio::test]
async fn test_failed_payment_marks_booking_failed() {
    let (mut app, booking) = webhook_app_with_order("order_2");

    let (status, _) = send(
        app.router(),
        webhook_request(&failed_event("evt_2", "order_2", "pay_2")),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    app.with_conn(|conn| {
        let p = queries::get_payment(conn, "order_2").unwrap().unwrap();
        assert_eq!(p.status, PaymentStatus::Failed);
        assert_eq!(p.failure_reason.as_deref(), Some("Payment was declined by the bank"));

        let b = queries::get_booking(conn, &booking.id).unwrap().unwrap();
        assert_eq!(b.status, BookingStatus::Failed);
        assert_eq!(b.payment_status, BookingPaymentStatus::Failed);
        assert!(b.confirmed_at.is_none());
    });
    assert!(app.drain_notices().is_empty());
}

#[tokio::test]
async fn test_capture_after_failed_attempt_confirms() {
    let (mut app, booking) = webhook_app_with_order("order_3");

    send(app.router(), webhook_request(&failed_event("evt_a", "order_3", "pay_a"))).await;
    let (status, _) = send(
        app.router(),
        webhook_request(&captured_event("evt_b", "order_3", "pay_b")),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    app.with_conn(|conn| {
        let b = queries::get_booking(conn, &booking.id).unwrap().unwrap();
        assert_eq!(b.status, BookingStatus::Confirmed);
        assert_eq!(b.payment_id.as_deref(), Some("pay_b"));
    });
    assert_eq!(app.drain_notices().len(), 1);
}

#[tokio::test]
async fn test_late_failure_does_not_undo_capture() {
    let (mut app, booking) = webhook_app_with_order("order_4");

    send(app.router(), webhook_request(&captured_event("evt_c", "order_4", "pay_c"))).await;
    let (status, body) = send(
        app.router(),
        webhook_request(&failed_event("evt_d", "order_4", "pay_d")),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    app.with_conn(|conn| {
        let p = queries::get_payment(conn, "order_4").unwrap().unwrap();
        assert_eq!(p.status, PaymentStatus::Captured);
        assert!(p.failure_reason.is_none());

        let b = queries::get_booking(conn, &booking.id).unwrap().unwrap();
        assert_eq!(b.status, BookingStatus::Confirmed);
        assert_eq!(b.payment_status, BookingPaymentStatus::Captured);
    });
    assert_eq!(app.drain_notices().len(), 1);
}

// ============ Refund ============

#[tokio::test]
async fn test_refund_processed_marks_refunded() {
    let (app, booking) = webhook_app_with_order("order_5");
    send(app.router(), webhook_request(&captured_event("evt_e", "order_5", "pay_5"))).await;

    let (status, _) = send(
        app.router(),
        webhook_request(&refund_event("evt_f", "pay_5", "rfnd_5")),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    app.with_conn(|conn| {
        let p = queries::get_payment(conn, "order_5").unwrap().unwrap();
        assert_eq!(p.status, PaymentStatus::Refunded);
        assert_eq!(p.refund_id.as_deref(), Some("rfnd_5"));

        let b = queries::get_booking(conn, &booking.id).unwrap().unwrap();
        assert_eq!(b.status, BookingStatus::Refunded);
        assert_eq!(b.payment_status, BookingPaymentStatus::Refunded);
        // Capture-time fields survive the refund
        assert_eq!(b.payment_id.as_deref(), Some("pay_5"));
        assert!(b.confirmed_at.is_some());
    });
}

#[tokio::test]
async fn test_refund_for_unknown_payment_is_acknowledged() {
    let app = create_test_app_unreachable_gateway();

    let (status, body) = send(
        app.router(),
        webhook_request(&refund_event("evt_g", "pay_unknown", "rfnd_g")),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(count_events(&app), 1);
}

#[tokio::test]
async fn test_refund_before_capture_is_noop() {
    let (app, booking) = webhook_app_with_order("order_6");
    app.with_conn(|conn| {
        // Gateway payment ID known from a failed attempt
        conn.execute("UPDATE payments SET payment_id = 'pay_6' WHERE id = 'order_6'", [])
            .unwrap();
    });

    let (status, _) = send(
        app.router(),
        webhook_request(&refund_event("evt_h", "pay_6", "rfnd_6")),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    app.with_conn(|conn| {
        let p = queries::get_payment(conn, "order_6").unwrap().unwrap();
        assert_eq!(p.status, PaymentStatus::Created);
        assert!(p.refund_id.is_none());
        let b = queries::get_booking(conn, &booking.id).unwrap().unwrap();
        assert_eq!(b.status, BookingStatus::PendingPayment);
    });
}

// ============ Other events ============

#[tokio::test]
async fn test_unhandled_event_acknowledged_and_recorded() {
    let (mut app, booking) = webhook_app_with_order("order_8");
    let event = json!({
        "id": "evt_auth",
        "event": "payment.authorized",
        "payload": {"payment": {"entity": {"id": "pay_8", "order_id": "order_8", "status": "authorized"}}}
    });

    let (status, body) = send(app.router(), webhook_request(&event)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");

    let (_, body) = send(app.router(), webhook_request(&event)).await;
    assert_eq!(body["status"], "already_processed");

    app.with_conn(|conn| {
        let b = queries::get_booking(conn, &booking.id).unwrap().unwrap();
        assert_eq!(b.status, BookingStatus::PendingPayment);
    });
    assert!(app.drain_notices().is_empty());
}

#[tokio::test]
async fn test_capture_without_payment_entity_rejected() {
    let app = create_test_app_unreachable_gateway();
    let event = json!({"id": "evt_bad", "event": "payment.captured", "payload": {}});

    let (status, _) = send(app.router(), webhook_request(&event)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(count_events(&app), 0);
}
