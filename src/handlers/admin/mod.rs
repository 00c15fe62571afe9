mod refunds;

pub use refunds::*;

use axum::{Router, middleware, routing::post};

use crate::db::AppState;
use crate::middleware::require_admin_role;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/payments/refunds", post(create_refund))
        .layer(middleware::from_fn_with_state(state, require_admin_role))
}
