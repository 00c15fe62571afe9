pub mod admin;
pub mod public;
pub mod webhooks;

use axum::Router;

use crate::db::AppState;
use crate::rate_limit::RateLimitConfig;

/// Every route the service exposes, before tracing and state are attached.
pub fn router(state: AppState, rate_limit: RateLimitConfig) -> Router<AppState> {
    Router::new()
        // Public endpoints (rate-limited per IP)
        .merge(public::router(rate_limit))
        // Gateway webhook (signature auth)
        .merge(webhooks::router())
        // Admin API (bearer key + admin role)
        .merge(admin::router(state))
}

/// Router with state attached, as served.
pub fn app(state: AppState, rate_limit: RateLimitConfig) -> Router {
    router(state.clone(), rate_limit).with_state(state)
}
