mod razorpay;

pub use razorpay::*;

use thiserror::Error;

use crate::crypto::{hmac_sha256_hex, signatures_match};
use crate::error::{AppError, msg};

/// Failure talking to the payment gateway.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Transport failure: DNS, connect, TLS, timeout.
    #[error("gateway unreachable: {0}")]
    Unreachable(#[source] reqwest::Error),

    /// The gateway answered with a non-success status.
    #[error("gateway rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("gateway returned an unexpected response: {0}")]
    InvalidResponse(String),
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Unreachable(e) => {
                tracing::error!(error = %e, "Payment gateway unreachable");
                AppError::FailedPrecondition(msg::GATEWAY_UNREACHABLE.into())
            }
            other => AppError::Internal(other.to_string()),
        }
    }
}

/// Verify a gateway webhook signature over the raw request body.
///
/// The signature is the lowercase hex HMAC-SHA256 of the exact bytes received,
/// keyed by the webhook secret. Must run before any JSON decoding.
pub fn verify_webhook_signature(secret: &str, payload: &[u8], signature: &str) -> bool {
    let expected = hmac_sha256_hex(secret.as_bytes(), payload);
    signatures_match(&expected, signature.trim())
}

/// Verify the signature handed to the client by the checkout widget.
///
/// The gateway signs `"{order_id}|{payment_id}"` with the API key secret.
pub fn verify_checkout_signature(
    key_secret: &str,
    order_id: &str,
    payment_id: &str,
    signature: &str,
) -> bool {
    let payload = format!("{}|{}", order_id, payment_id);
    let expected = hmac_sha256_hex(key_secret.as_bytes(), payload.as_bytes());
    signatures_match(&expected, signature.trim())
}
