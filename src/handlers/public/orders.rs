use axum::extract::State;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::db::{AppState, queries};
use crate::error::{AppError, Result, msg};
use crate::extractors::Json;
use crate::models::{CURRENCY, CreateBooking};
use crate::payments::OrderNotes;
use crate::util::to_minor_units;

/// Booking details as submitted by the checkout form.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingData {
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub participants: u32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Major units (rupees)
    pub total_amount: f64,
    pub pickup_location: String,
    #[serde(default)]
    pub special_requests: Option<String>,
    #[serde(default)]
    pub emergency_contact: Option<String>,
    #[serde(default)]
    pub tour_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub booking_data: BookingData,
    pub user_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderResponse {
    pub order_id: String,
    /// Minor units (paise)
    pub amount: i64,
    pub currency: &'static str,
    /// Public gateway key for the checkout widget
    pub key: String,
    pub booking_id: String,
}

impl CreateOrderRequest {
    fn into_booking(self) -> CreateBooking {
        let data = self.booking_data;
        CreateBooking {
            user_id: self.user_id,
            customer_name: data.customer_name,
            customer_email: data.customer_email,
            customer_phone: data.customer_phone,
            participants: data.participants,
            start_date: data.start_date,
            end_date: data.end_date,
            total_amount: data.total_amount,
            pickup_location: data.pickup_location,
            special_requests: data.special_requests.filter(|s| !s.trim().is_empty()),
            emergency_contact: data.emergency_contact.filter(|s| !s.trim().is_empty()),
            tour_name: data.tour_name.filter(|s| !s.trim().is_empty()),
        }
    }
}

/// Create a `pending_payment` booking and a gateway order for it.
///
/// If the gateway call fails the booking is left `pending_payment` with no
/// order; it is never paid and never confirmed.
pub async fn create_order(
    State(state): State<AppState>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<Json<CreateOrderResponse>> {
    let input = request.into_booking();
    input.validate()?;

    let gateway = state
        .gateway
        .as_ref()
        .ok_or_else(|| AppError::FailedPrecondition(msg::GATEWAY_NOT_CONFIGURED.into()))?;

    let amount = to_minor_units(input.total_amount)
        .ok_or_else(|| AppError::BadRequest(msg::INVALID_TOTAL_AMOUNT.into()))?;

    let booking = {
        let conn = state.db.get()?;
        queries::create_booking(&conn, &input)?
    };

    let order = gateway
        .create_order(
            amount,
            CURRENCY,
            &booking.id,
            OrderNotes {
                booking_id: &booking.id,
                user_id: &booking.user_id,
            },
        )
        .await
        .map_err(|e| {
            tracing::warn!(
                booking_id = %booking.id,
                error = %e,
                "Gateway order creation failed, booking left pending"
            );
            AppError::from(e)
        })?;

    {
        let mut conn = state.db.get()?;
        let tx = conn.transaction()?;
        queries::create_payment(&tx, &order.id, &booking.id, amount, CURRENCY)?;
        queries::set_booking_order(&tx, &booking.id, &order.id)?;
        tx.commit()?;
    }

    tracing::info!(
        booking_id = %booking.id,
        order_id = %order.id,
        amount,
        "Created gateway order for booking"
    );

    Ok(Json(CreateOrderResponse {
        order_id: order.id,
        amount,
        currency: CURRENCY,
        key: gateway.key_id().to_string(),
        booking_id: booking.id,
    }))
}
