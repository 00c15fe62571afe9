//! Admin refunds: authentication, role check, gateway call

#[path = "../common/mod.rs"]
mod common;

use axum::http::StatusCode;
use common::*;
use serde_json::json;
use tourpay::handlers::webhooks::common::{CaptureData, apply_capture};

/// Admin key plus a captured local payment `pay_1`.
fn admin_with_captured_payment(app: &TestApp) -> String {
    app.with_conn(|conn| {
        create_test_booking_with_order(conn, "order_1");
        apply_capture(
            conn,
            &CaptureData {
                order_id: "order_1".into(),
                payment_id: Some("pay_1".into()),
            },
        )
        .unwrap();
        let (_, key) = create_test_user(conn, "ops@example.com", UserRole::Admin);
        key
    })
}

#[tokio::test]
async fn test_refund_requires_api_key() {
    let app = create_test_app().await;
    let mock = app.gateway.clone().unwrap();

    let (status, body) = send(
        app.router(),
        post_json("/payments/refunds", &json!({"paymentId": "pay_1"}), None),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthenticated");
    assert!(mock.requests().is_empty());
}

#[tokio::test]
async fn test_refund_rejects_unknown_key() {
    let app = create_test_app().await;

    let (status, _) = send(
        app.router(),
        post_json(
            "/payments/refunds",
            &json!({"paymentId": "pay_1"}),
            Some("tp_key_doesnotexist"),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refund_rejects_revoked_key() {
    let app = create_test_app().await;
    let key = app.with_conn(|conn| {
        let (user, key) = create_test_user(conn, "ops@example.com", UserRole::Admin);
        let (_, record) = queries::get_user_by_api_key(conn, &key).unwrap().unwrap();
        assert_eq!(record.user_id, user.id);
        assert!(queries::revoke_api_key(conn, &record.id).unwrap());
        key
    });

    let (status, _) = send(
        app.router(),
        post_json("/payments/refunds", &json!({"paymentId": "pay_1"}), Some(&key)),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refund_forbidden_for_customer() {
    let app = create_test_app().await;
    let mock = app.gateway.clone().unwrap();
    let (_, key) = app.with_conn(|conn| create_test_user(conn, "asha@example.com", UserRole::Customer));

    let (status, body) = send(
        app.router(),
        post_json("/payments/refunds", &json!({"paymentId": "pay_1"}), Some(&key)),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "permission-denied");
    assert!(mock.requests().is_empty(), "gateway never called for non-admins");
}

#[tokio::test]
async fn test_admin_partial_refund() {
    let app = create_test_app().await;
    let mock = app.gateway.clone().unwrap();
    let key = admin_with_captured_payment(&app);

    let (status, body) = send(
        app.router(),
        post_json(
            "/payments/refunds",
            &json!({"paymentId": "pay_1", "amount": 500.25, "reason": "Trip shortened"}),
            Some(&key),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "body: {}", body);
    assert!(body["refundId"].as_str().unwrap().starts_with("rfnd_mock"));
    assert_eq!(body["status"], "processed");
    assert_eq!(body["amount"], 500.25);

    let requests = mock.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].path, "/payments/pay_1/refund");
    assert_eq!(requests[0].body["amount"], 50_025);
    assert_eq!(requests[0].body["notes"]["reason"], "Trip shortened");
}

#[tokio::test]
async fn test_admin_full_refund_omits_amount() {
    let app = create_test_app().await;
    let mock = app.gateway.clone().unwrap();
    let key = admin_with_captured_payment(&app);

    let (status, body) = send(
        app.router(),
        post_json("/payments/refunds", &json!({"paymentId": "pay_1"}), Some(&key)),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["amount"], 15000.0);

    let requests = mock.requests();
    assert!(requests[0].body.get("amount").is_none());
    assert!(requests[0].body.get("notes").is_none());
}

#[tokio::test]
async fn test_refund_rejects_invalid_amount() {
    let app = create_test_app().await;
    let mock = app.gateway.clone().unwrap();
    let (_, key) = app.with_conn(|conn| create_test_user(conn, "ops@example.com", UserRole::Admin));

    for amount in [json!(0), json!(-10.5)] {
        let (status, body) = send(
            app.router(),
            post_json(
                "/payments/refunds",
                &json!({"paymentId": "pay_1", "amount": amount}),
                Some(&key),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "amount {} accepted", amount);
        assert_eq!(body["code"], "invalid-argument");
    }

    let (status, _) = send(
        app.router(),
        post_json("/payments/refunds", &json!({"paymentId": " "}), Some(&key)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert!(mock.requests().is_empty());
}

#[tokio::test]
async fn test_refund_unknown_payment() {
    let app = create_test_app().await;
    let mock = app.gateway.clone().unwrap();
    let (_, key) = app.with_conn(|conn| create_test_user(conn, "ops@example.com", UserRole::Admin));

    let (status, body) = send(
        app.router(),
        post_json("/payments/refunds", &json!({"paymentId": "pay_elsewhere"}), Some(&key)),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not-found");
    assert!(mock.requests().is_empty());
}

#[tokio::test]
async fn test_refund_does_not_touch_local_state() {
    let app = create_test_app().await;
    let (booking, key) = app.with_conn(|conn| {
        let (booking, _) = create_test_booking_with_order(conn, "order_1");
        conn.execute(
            "UPDATE payments SET status = 'captured', payment_id = 'pay_1' WHERE id = 'order_1'",
            [],
        )
        .unwrap();
        conn.execute(
            "UPDATE bookings SET status = 'confirmed', payment_status = 'captured', payment_id = 'pay_1'",
            [],
        )
        .unwrap();
        let (_, key) = create_test_user(conn, "ops@example.com", UserRole::Admin);
        (booking, key)
    });

    let (status, _) = send(
        app.router(),
        post_json("/payments/refunds", &json!({"paymentId": "pay_1"}), Some(&key)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // State moves only when refund.processed arrives
    app.with_conn(|conn| {
        let p = queries::get_payment(conn, "order_1").unwrap().unwrap();
        assert_eq!(p.status, PaymentStatus::Captured);
        assert!(p.refund_id.is_none());
        let b = queries::get_booking(conn, &booking.id).unwrap().unwrap();
        assert_eq!(b.status, BookingStatus::Confirmed);
    });
}

#[tokio::test]
async fn test_refund_gateway_error() {
    let app = create_test_app().await;
    app.gateway.as_ref().unwrap().fail_with(400);
    let key = admin_with_captured_payment(&app);

    let (status, body) = send(
        app.router(),
        post_json("/payments/refunds", &json!({"paymentId": "pay_1"}), Some(&key)),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "internal");
}

#[tokio::test]
async fn test_refund_gateway_unreachable() {
    let app = create_test_app_unreachable_gateway();
    let key = admin_with_captured_payment(&app);

    let (status, body) = send(
        app.router(),
        post_json("/payments/refunds", &json!({"paymentId": "pay_1"}), Some(&key)),
    )
    .await;

    assert_eq!(status, StatusCode::PRECONDITION_FAILED);
    assert_eq!(body["code"], "failed-precondition");
}
