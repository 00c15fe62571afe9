//! Event deduplication and payment state transitions.
//!
//! Shared by the gateway webhook and the client-side confirmation path. Each
//! transition reads and writes the Payment and its Booking inside one
//! `IMMEDIATE` transaction, so the pair is never observed half-updated.

use axum::http::StatusCode;
use rusqlite::{Connection, TransactionBehavior};

use crate::db::queries::{self, PaymentUpdate};
use crate::error::{AppError, Result};
use crate::models::{Booking, Payment, PaymentStatus};
use crate::notifier::Notifier;

/// Result type for webhook operations.
pub type WebhookResult = (StatusCode, &'static str);

/// A successful capture, keyed by the gateway order.
#[derive(Debug, Clone)]
pub struct CaptureData {
    pub order_id: String,
    pub payment_id: Option<String>,
}

/// A failed payment attempt.
#[derive(Debug, Clone)]
pub struct FailureData {
    pub order_id: String,
    pub payment_id: Option<String>,
    pub reason: Option<String>,
}

/// A processed refund, keyed by the gateway payment.
#[derive(Debug, Clone)]
pub struct RefundData {
    pub payment_id: String,
    pub refund_id: String,
}

/// Parsed gateway event with the data each transition needs.
#[derive(Debug, Clone)]
pub enum WebhookEvent {
    Captured(CaptureData),
    Failed(FailureData),
    Refunded(RefundData),
    /// Event type with no effect on bookings
    Ignored,
}

/// State of the Payment and Booking after a transition attempt.
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub booking: Booking,
    pub payment: Payment,
    /// False when the transition was a no-op (already applied or out of order)
    pub changed: bool,
}

enum Lookup<'a> {
    Order(&'a str),
    GatewayPayment(&'a str),
}

/// Record an event ID as processed.
///
/// Returns false when the event was already recorded. The record is written
/// before the transition runs, so a crash in between drops that update
/// rather than applying it twice.
pub fn record_event(conn: &Connection, event_id: &str, event_type: &str) -> Result<bool> {
    let recorded = queries::try_record_processed_event(conn, event_id, event_type)?;
    if !recorded {
        tracing::info!(event_id = %event_id, event_type = %event_type, "Event already processed, skipping");
    }
    Ok(recorded)
}

/// Apply a capture: Payment `captured`, Booking `confirmed` / `captured`.
///
/// Applies from `created` or `failed`. A missing Payment is a data-integrity
/// error since the order was created by this service.
pub fn apply_capture(conn: &mut Connection, data: &CaptureData) -> Result<TransitionOutcome> {
    let update = PaymentUpdate {
        payment_id: data.payment_id.as_deref(),
        ..Default::default()
    };
    transition(conn, Lookup::Order(&data.order_id), PaymentStatus::Captured, &update)?.ok_or_else(
        || AppError::DataIntegrity(format!("no payment record for captured order {}", data.order_id)),
    )
}

/// Apply a failure: Payment `failed`, Booking `failed` / `failed`.
pub fn apply_failure(conn: &mut Connection, data: &FailureData) -> Result<TransitionOutcome> {
    let update = PaymentUpdate {
        payment_id: data.payment_id.as_deref(),
        failure_reason: data.reason.as_deref(),
        ..Default::default()
    };
    transition(conn, Lookup::Order(&data.order_id), PaymentStatus::Failed, &update)?.ok_or_else(
        || AppError::DataIntegrity(format!("no payment record for failed order {}", data.order_id)),
    )
}

/// Apply a refund: Payment `refunded`, Booking `refunded` / `refunded`.
///
/// Returns None when no Payment carries the gateway payment ID; refunds for
/// payments this service never saw are ignored.
pub fn apply_refund(conn: &mut Connection, data: &RefundData) -> Result<Option<TransitionOutcome>> {
    let update = PaymentUpdate {
        refund_id: Some(&data.refund_id),
        ..Default::default()
    };
    let outcome = transition(
        conn,
        Lookup::GatewayPayment(&data.payment_id),
        PaymentStatus::Refunded,
        &update,
    )?;

    if outcome.is_none() {
        tracing::warn!(
            payment_id = %data.payment_id,
            refund_id = %data.refund_id,
            "Refund for unknown payment, ignoring"
        );
    }
    Ok(outcome)
}

fn transition(
    conn: &mut Connection,
    lookup: Lookup<'_>,
    target: PaymentStatus,
    update: &PaymentUpdate<'_>,
) -> Result<Option<TransitionOutcome>> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let payment = match lookup {
        Lookup::Order(order_id) => queries::get_payment(&tx, order_id)?,
        Lookup::GatewayPayment(payment_id) => queries::get_payment_by_gateway_id(&tx, payment_id)?,
    };
    let Some(payment) = payment else {
        return Ok(None);
    };

    let booking = queries::get_booking(&tx, &payment.booking_id)?.ok_or_else(|| {
        AppError::DataIntegrity(format!(
            "payment {} references missing booking {}",
            payment.id, payment.booking_id
        ))
    })?;

    if !payment.status.can_transition_to(target) {
        tracing::warn!(
            order_id = %payment.id,
            booking_id = %booking.id,
            from = %payment.status.as_ref(),
            to = %target.as_ref(),
            "Skipping payment transition"
        );
        // Nothing written, dropping the transaction rolls back
        return Ok(Some(TransitionOutcome {
            booking,
            payment,
            changed: false,
        }));
    }

    queries::update_payment_status(&tx, &payment.id, target, update)?;

    let (booking_status, booking_payment_status) = target.booking_states();
    let booking_payment_id = match target {
        PaymentStatus::Captured => update.payment_id,
        _ => None,
    };
    queries::update_booking_payment_state(
        &tx,
        &booking.id,
        booking_status,
        booking_payment_status,
        booking_payment_id,
    )?;

    let payment = queries::get_payment(&tx, &payment.id)?
        .ok_or_else(|| AppError::DataIntegrity(format!("payment {} vanished mid-transition", payment.id)))?;
    let booking = queries::get_booking(&tx, &booking.id)?
        .ok_or_else(|| AppError::DataIntegrity(format!("booking {} vanished mid-transition", booking.id)))?;

    tx.commit()?;

    tracing::info!(
        order_id = %payment.id,
        booking_id = %booking.id,
        payment_status = %payment.status.as_ref(),
        booking_status = %booking.status.as_ref(),
        "Payment transition applied"
    );

    Ok(Some(TransitionOutcome {
        booking,
        payment,
        changed: true,
    }))
}

/// Queue a confirmation if the outcome is a fresh capture.
pub fn notify_if_confirmed(notifier: &Notifier, outcome: &TransitionOutcome) {
    if outcome.changed && outcome.payment.status == PaymentStatus::Captured {
        notifier.dispatch(outcome.booking.clone(), outcome.payment.clone());
    }
}
