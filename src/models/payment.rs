use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use super::{BookingPaymentStatus, BookingStatus};

/// Currency for every gateway order.
pub const CURRENCY: &str = "INR";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaymentStatus {
    Created,
    Captured,
    Failed,
    Refunded,
}

impl PaymentStatus {
    /// Whether a payment in this state may move to `target`.
    ///
    /// A failed attempt can still be followed by a successful capture on the
    /// same order; nothing leaves `refunded`.
    pub fn can_transition_to(self, target: PaymentStatus) -> bool {
        matches!(
            (self, target),
            (PaymentStatus::Created, PaymentStatus::Captured)
                | (PaymentStatus::Failed, PaymentStatus::Captured)
                | (PaymentStatus::Created, PaymentStatus::Failed)
                | (PaymentStatus::Captured, PaymentStatus::Refunded)
        )
    }

    /// The booking states that accompany this payment state.
    pub fn booking_states(self) -> (BookingStatus, BookingPaymentStatus) {
        match self {
            PaymentStatus::Created => (BookingStatus::PendingPayment, BookingPaymentStatus::Pending),
            PaymentStatus::Captured => (BookingStatus::Confirmed, BookingPaymentStatus::Captured),
            PaymentStatus::Failed => (BookingStatus::Failed, BookingPaymentStatus::Failed),
            PaymentStatus::Refunded => (BookingStatus::Refunded, BookingPaymentStatus::Refunded),
        }
    }
}

/// Payment record keyed by the gateway order ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    /// Gateway order ID
    pub id: String,
    pub booking_id: String,
    /// Amount in minor units (paise)
    pub amount: i64,
    pub currency: String,
    pub status: PaymentStatus,
    /// Gateway payment ID, known once a payment attempt arrives
    pub payment_id: Option<String>,
    pub refund_id: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}
