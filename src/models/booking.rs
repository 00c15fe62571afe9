use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use crate::error::{AppError, Result, msg};

/// Lifecycle of a booking. Moves only together with its payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BookingStatus {
    PendingPayment,
    Confirmed,
    Failed,
    Refunded,
}

/// Payment state as mirrored onto the booking document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BookingPaymentStatus {
    Pending,
    Captured,
    Failed,
    Refunded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: String,
    pub user_id: String,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub participants: u32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Total in major currency units (rupees)
    pub total_amount: f64,
    pub pickup_location: String,
    pub special_requests: Option<String>,
    pub emergency_contact: Option<String>,
    pub tour_name: Option<String>,
    pub status: BookingStatus,
    pub payment_status: BookingPaymentStatus,
    /// Gateway order ID, set once the order has been created
    pub order_id: Option<String>,
    /// Gateway payment ID, set on capture
    pub payment_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub confirmed_at: Option<i64>,
}

/// Validated booking fields for insertion.
#[derive(Debug, Clone)]
pub struct CreateBooking {
    pub user_id: String,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub participants: u32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_amount: f64,
    pub pickup_location: String,
    pub special_requests: Option<String>,
    pub emergency_contact: Option<String>,
    pub tour_name: Option<String>,
}

impl CreateBooking {
    pub fn validate(&self) -> Result<()> {
        if self.user_id.trim().is_empty() {
            return Err(AppError::BadRequest(msg::USER_ID_REQUIRED.into()));
        }
        if self.customer_name.trim().is_empty() {
            return Err(AppError::BadRequest(msg::CUSTOMER_NAME_REQUIRED.into()));
        }
        validate_email_format(&self.customer_email)?;
        if self.customer_phone.trim().is_empty() {
            return Err(AppError::BadRequest(msg::CUSTOMER_PHONE_REQUIRED.into()));
        }
        if self.participants == 0 {
            return Err(AppError::BadRequest(msg::INVALID_PARTICIPANTS.into()));
        }
        if !self.total_amount.is_finite() || self.total_amount <= 0.0 {
            return Err(AppError::BadRequest(msg::INVALID_TOTAL_AMOUNT.into()));
        }
        if self.end_date < self.start_date {
            return Err(AppError::BadRequest(msg::INVALID_DATE_RANGE.into()));
        }
        if self.pickup_location.trim().is_empty() {
            return Err(AppError::BadRequest(msg::PICKUP_LOCATION_REQUIRED.into()));
        }
        Ok(())
    }
}

/// Basic email format validation.
///
/// Exactly one @, non-empty local part without spaces, and a dotted domain
/// that does not start or end with a dot. Not RFC 5322.
fn validate_email_format(email: &str) -> Result<()> {
    let email = email.trim();

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return Err(AppError::BadRequest(msg::INVALID_EMAIL_FORMAT.into()));
    }

    let (local_part, domain_part) = (parts[0], parts[1]);

    if local_part.is_empty() || local_part.contains(' ') {
        return Err(AppError::BadRequest(msg::INVALID_EMAIL_FORMAT.into()));
    }

    if domain_part.is_empty()
        || !domain_part.contains('.')
        || domain_part.starts_with('.')
        || domain_part.ends_with('.')
    {
        return Err(AppError::BadRequest(msg::INVALID_EMAIL_FORMAT.into()));
    }

    Ok(())
}
