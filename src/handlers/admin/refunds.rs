use axum::{Extension, extract::State};
use serde::{Deserialize, Serialize};

use crate::db::{AppState, queries};
use crate::error::{AppError, OptionExt, Result, msg};
use crate::extractors::Json;
use crate::middleware::AdminContext;
use crate::util::{to_major_units, to_minor_units};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRefundRequest {
    pub payment_id: String,
    /// Major units; omitted for a full refund
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRefundResponse {
    pub refund_id: String,
    pub status: String,
    /// Major units
    pub amount: f64,
}

/// Ask the gateway to refund a payment this service created the order for.
///
/// Payment and booking state are left alone here; they move to `refunded`
/// when the gateway's `refund.processed` webhook arrives.
pub async fn create_refund(
    State(state): State<AppState>,
    Extension(ctx): Extension<AdminContext>,
    Json(request): Json<CreateRefundRequest>,
) -> Result<Json<CreateRefundResponse>> {
    let payment_id = request.payment_id.trim();
    if payment_id.is_empty() {
        return Err(AppError::BadRequest(msg::PAYMENT_ID_REQUIRED.into()));
    }

    let amount = match request.amount {
        Some(amount) => Some(
            to_minor_units(amount)
                .ok_or_else(|| AppError::BadRequest(msg::INVALID_REFUND_AMOUNT.into()))?,
        ),
        None => None,
    };

    let gateway = state
        .gateway
        .as_ref()
        .ok_or_else(|| AppError::FailedPrecondition(msg::GATEWAY_NOT_CONFIGURED.into()))?;

    let payment = {
        let conn = state.db.get()?;
        queries::get_payment_by_gateway_id(&conn, payment_id)?.or_not_found(msg::PAYMENT_NOT_FOUND)?
    };

    let reason = request
        .reason
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty());

    let refund = gateway.create_refund(payment_id, amount, reason).await?;

    tracing::info!(
        admin_id = %ctx.user.id,
        booking_id = %payment.booking_id,
        key_id = %ctx.auth_method.key_id,
        key_prefix = %ctx.auth_method.key_prefix,
        payment_id = %payment_id,
        refund_id = %refund.id,
        amount = refund.amount,
        "Refund initiated"
    );

    Ok(Json(CreateRefundResponse {
        refund_id: refund.id,
        status: refund.status,
        amount: to_major_units(refund.amount),
    }))
}
