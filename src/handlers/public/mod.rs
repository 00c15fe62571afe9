mod confirm;
mod orders;

pub use confirm::*;
pub use orders::*;

use axum::{
    Json, Router,
    routing::{get, post},
};
use serde::Serialize;

use crate::db::AppState;
use crate::rate_limit::{self, RateLimitConfig};

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub fn router(rate_limit: RateLimitConfig) -> Router<AppState> {
    let mut orders = Router::new().route("/payments/orders", post(create_order));
    if let Some(layer) = rate_limit::strict_layer(rate_limit.strict_rpm) {
        orders = orders.layer(layer);
    }

    let mut confirm = Router::new().route("/payments/confirm", post(confirm_payment));
    if let Some(layer) = rate_limit::standard_layer(rate_limit.standard_rpm) {
        confirm = confirm.layer(layer);
    }

    Router::new()
        .route("/health", get(health))
        .merge(orders)
        .merge(confirm)
}
