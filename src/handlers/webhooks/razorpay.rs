use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use serde::Serialize;

use crate::db::AppState;
use crate::error::AppError;
use crate::payments::{GatewayWebhookEvent, verify_webhook_signature};
use crate::util::header_str;

use super::common::{
    CaptureData, FailureData, RefundData, WebhookEvent, WebhookResult, apply_capture,
    apply_failure, apply_refund, notify_if_confirmed, record_event,
};

pub const SIGNATURE_HEADER: &str = "x-gateway-signature";
pub const EVENT_ID_HEADER: &str = "x-gateway-event-id";

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub status: &'static str,
}

impl WebhookAck {
    fn success() -> Json<Self> {
        Json(Self { status: "success" })
    }

    fn already_processed() -> Json<Self> {
        Json(Self {
            status: "already_processed",
        })
    }
}

/// Map the gateway envelope onto a transition.
///
/// Events that drive a transition must carry the entities it needs.
pub fn parse_event(envelope: &GatewayWebhookEvent) -> Result<WebhookEvent, WebhookResult> {
    const MISSING_PAYMENT: WebhookResult = (StatusCode::BAD_REQUEST, "Missing payment entity");

    match envelope.event.as_str() {
        "payment.captured" => {
            let payment = envelope.payment().ok_or(MISSING_PAYMENT)?;
            let order_id = payment
                .order_id
                .clone()
                .ok_or((StatusCode::BAD_REQUEST, "Missing order_id"))?;
            Ok(WebhookEvent::Captured(CaptureData {
                order_id,
                payment_id: Some(payment.id.clone()),
            }))
        }
        "order.paid" => {
            let order_id = envelope
                .order()
                .map(|o| o.id.clone())
                .or_else(|| envelope.payment().and_then(|p| p.order_id.clone()))
                .ok_or((StatusCode::BAD_REQUEST, "Missing order entity"))?;
            Ok(WebhookEvent::Captured(CaptureData {
                order_id,
                payment_id: envelope.payment().map(|p| p.id.clone()),
            }))
        }
        "payment.failed" => {
            let payment = envelope.payment().ok_or(MISSING_PAYMENT)?;
            let order_id = payment
                .order_id
                .clone()
                .ok_or((StatusCode::BAD_REQUEST, "Missing order_id"))?;
            Ok(WebhookEvent::Failed(FailureData {
                order_id,
                payment_id: Some(payment.id.clone()),
                reason: payment.failure_reason().map(String::from),
            }))
        }
        "refund.processed" => {
            let refund = envelope
                .refund()
                .ok_or((StatusCode::BAD_REQUEST, "Missing refund entity"))?;
            Ok(WebhookEvent::Refunded(RefundData {
                payment_id: refund.payment_id.clone(),
                refund_id: refund.id.clone(),
            }))
        }
        _ => Ok(WebhookEvent::Ignored),
    }
}

fn internal_error(e: AppError) -> WebhookResult {
    match e {
        AppError::DataIntegrity(msg) => {
            tracing::error!("Webhook data integrity error: {}", msg);
            (StatusCode::INTERNAL_SERVER_ERROR, "Data integrity error")
        }
        other => {
            tracing::error!("Webhook processing error: {}", other);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database error")
        }
    }
}

pub async fn handle_gateway_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, WebhookResult> {
    let signature = header_str(&headers, SIGNATURE_HEADER)
        .ok_or((StatusCode::BAD_REQUEST, "Missing signature header"))?;

    if body.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Empty body"));
    }

    let secret = state.webhook_secret.as_deref().ok_or_else(|| {
        tracing::error!("GATEWAY_WEBHOOK_SECRET is not configured, rejecting webhook");
        (StatusCode::INTERNAL_SERVER_ERROR, "Webhook not configured")
    })?;

    if !verify_webhook_signature(secret, &body, signature) {
        tracing::warn!("Gateway webhook rejected: invalid signature");
        return Err((StatusCode::BAD_REQUEST, "Invalid signature"));
    }

    let envelope: GatewayWebhookEvent = serde_json::from_slice(&body).map_err(|e| {
        tracing::warn!("Gateway webhook rejected: invalid payload: {}", e);
        (StatusCode::BAD_REQUEST, "Invalid JSON")
    })?;

    let event = parse_event(&envelope)?;

    let event_id = header_str(&headers, EVENT_ID_HEADER)
        .map(String::from)
        .or_else(|| envelope.id.clone().filter(|id| !id.trim().is_empty()))
        .ok_or((StatusCode::BAD_REQUEST, "Missing event ID"))?;

    let mut conn = state.db.get().map_err(|e| {
        tracing::error!("DB connection error: {}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Database error")
    })?;

    if !record_event(&conn, &event_id, &envelope.event).map_err(internal_error)? {
        return Ok(WebhookAck::already_processed());
    }

    tracing::debug!(event_id = %event_id, event_type = %envelope.event, "Processing gateway event");

    match event {
        WebhookEvent::Captured(data) => {
            let outcome = apply_capture(&mut conn, &data).map_err(internal_error)?;
            drop(conn);
            notify_if_confirmed(&state.notifier, &outcome);
        }
        WebhookEvent::Failed(data) => {
            apply_failure(&mut conn, &data).map_err(internal_error)?;
        }
        WebhookEvent::Refunded(data) => {
            apply_refund(&mut conn, &data).map_err(internal_error)?;
        }
        WebhookEvent::Ignored => {
            tracing::info!(event_id = %event_id, event_type = %envelope.event, "Ignoring unhandled gateway event");
        }
    }

    Ok(WebhookAck::success())
}
