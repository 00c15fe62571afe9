pub mod common;
pub mod razorpay;

pub use razorpay::handle_gateway_webhook;

use axum::{Router, routing::post};

use crate::db::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/payments/webhook", post(handle_gateway_webhook))
}
