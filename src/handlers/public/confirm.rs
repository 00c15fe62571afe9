use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::db::{AppState, queries};
use crate::error::{AppError, OptionExt, Result, msg};
use crate::extractors::Json;
use crate::handlers::webhooks::common::{CaptureData, apply_capture, notify_if_confirmed};
use crate::models::BookingStatus;
use crate::payments::GatewayError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmPaymentRequest {
    pub payment_id: String,
    pub order_id: String,
    /// Checkout signature returned to the client by the gateway widget
    #[serde(default)]
    pub signature: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmPaymentResponse {
    pub success: bool,
    pub booking_id: String,
    pub message: String,
}

/// Client-side confirmation path, typically called right after checkout.
///
/// The payment is proven either by the checkout signature or by asking the
/// gateway, then the same capture transition as the webhook is applied.
/// Whichever of the two arrives second is a no-op.
pub async fn confirm_payment(
    State(state): State<AppState>,
    Json(request): Json<ConfirmPaymentRequest>,
) -> Result<Json<ConfirmPaymentResponse>> {
    let payment_id = request.payment_id.trim();
    let order_id = request.order_id.trim();

    if payment_id.is_empty() {
        return Err(AppError::BadRequest(msg::PAYMENT_ID_REQUIRED.into()));
    }
    if order_id.is_empty() {
        return Err(AppError::BadRequest(msg::ORDER_ID_REQUIRED.into()));
    }

    let gateway = state
        .gateway
        .as_ref()
        .ok_or_else(|| AppError::FailedPrecondition(msg::GATEWAY_NOT_CONFIGURED.into()))?;

    {
        let conn = state.db.get()?;
        queries::get_payment(&conn, order_id)?.or_not_found(msg::ORDER_NOT_FOUND)?;
    }

    match request.signature.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(signature) => {
            if !gateway.verify_checkout_signature(order_id, payment_id, signature) {
                tracing::warn!(order_id = %order_id, payment_id = %payment_id, "Checkout signature mismatch");
                return Err(AppError::BadRequest(msg::INVALID_PAYMENT_SIGNATURE.into()));
            }
        }
        None => {
            let payment = gateway.fetch_payment(payment_id).await.map_err(|e| match e {
                // Unknown or malformed payment ID on the gateway side
                GatewayError::Rejected { status: 400..=499, .. } => {
                    tracing::warn!(order_id = %order_id, payment_id = %payment_id, error = %e, "Gateway has no such payment");
                    AppError::BadRequest(msg::PAYMENT_NOT_CAPTURED.into())
                }
                other => AppError::from(other),
            })?;
            if payment.order_id.as_deref() != Some(order_id) || !payment.is_captured() {
                tracing::warn!(
                    order_id = %order_id,
                    payment_id = %payment_id,
                    gateway_status = %payment.status,
                    "Gateway does not report a capture for this order"
                );
                return Err(AppError::BadRequest(msg::PAYMENT_NOT_CAPTURED.into()));
            }
        }
    }

    let outcome = {
        let mut conn = state.db.get()?;
        apply_capture(
            &mut conn,
            &CaptureData {
                order_id: order_id.to_string(),
                payment_id: Some(payment_id.to_string()),
            },
        )?
    };

    notify_if_confirmed(&state.notifier, &outcome);

    let message = match (outcome.changed, outcome.booking.status) {
        (true, _) => "Payment confirmed",
        (false, BookingStatus::Confirmed) => "Booking already confirmed",
        (false, status) => {
            return Err(AppError::FailedPrecondition(format!(
                "Booking is {}, payment cannot be confirmed",
                status.as_ref()
            )));
        }
    };

    Ok(Json(ConfirmPaymentResponse {
        success: true,
        booking_id: outcome.booking.id,
        message: message.to_string(),
    }))
}
