//! Processed-event records

#[path = "../common/mod.rs"]
mod common;

use common::*;
use tourpay::handlers::webhooks::common::record_event;

#[test]
fn test_first_record_wins() {
    let app = create_unconfigured_test_app();

    app.with_conn(|conn| {
        assert!(record_event(conn, "evt_1", "payment.captured").unwrap());
        assert!(!record_event(conn, "evt_1", "payment.captured").unwrap());
        assert!(!record_event(conn, "evt_1", "payment.failed").unwrap());

        let event = queries::get_processed_event(conn, "evt_1").unwrap().unwrap();
        assert_eq!(event.event_id, "evt_1");
        // Write-once: the original type is kept
        assert_eq!(event.event_type, "payment.captured");
        assert!(event.processed_at > 0);
    });
}

#[test]
fn test_distinct_events_recorded_separately() {
    let app = create_unconfigured_test_app();

    app.with_conn(|conn| {
        assert!(queries::try_record_processed_event(conn, "evt_1", "payment.captured").unwrap());
        assert!(queries::try_record_processed_event(conn, "evt_2", "payment.captured").unwrap());
        assert!(queries::get_processed_event(conn, "evt_3").unwrap().is_none());
    });
}

#[test]
fn test_record_survives_failed_transition() {
    use tourpay::handlers::webhooks::common::{CaptureData, apply_capture};

    let app = create_unconfigured_test_app();

    app.with_conn(|conn| {
        assert!(record_event(conn, "evt_orphan", "payment.captured").unwrap());
        let result = apply_capture(
            conn,
            &CaptureData {
                order_id: "order_missing".into(),
                payment_id: Some("pay_1".into()),
            },
        );
        assert!(result.is_err());

        // A redelivery is still treated as processed
        assert!(!record_event(conn, "evt_orphan", "payment.captured").unwrap());
    });
}
