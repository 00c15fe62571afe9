use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use crate::db::{AppState, queries};
use crate::error::{AppError, Result, msg};
use crate::models::User;
use crate::util::extract_bearer_token;

use super::AuthMethod;

/// Authenticated administrator, inserted into request extensions.
#[derive(Debug, Clone)]
pub struct AdminContext {
    pub user: User,
    pub auth_method: AuthMethod,
}

/// Resolve the caller from a bearer API key.
fn authenticate_api_key(state: &AppState, headers: &HeaderMap) -> Result<(User, AuthMethod)> {
    let token = extract_bearer_token(headers).ok_or(AppError::Unauthorized)?;
    let conn = state.db.get()?;

    let (user, api_key_record) =
        queries::get_user_by_api_key(&conn, token)?.ok_or(AppError::Unauthorized)?;

    let auth_method = AuthMethod {
        key_id: api_key_record.id,
        key_prefix: api_key_record.prefix,
    };

    Ok((user, auth_method))
}

/// Require an authenticated user with the admin role.
///
/// No or unknown key is `unauthenticated`; a valid non-admin key is
/// `permission-denied`. The handler never runs in either case.
pub async fn require_admin_role(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    let (user, auth_method) = authenticate_api_key(&state, request.headers())?;

    if !user.is_admin() {
        tracing::warn!(
            user_id = %user.id,
            key_prefix = %auth_method.key_prefix,
            "Non-admin attempted admin action"
        );
        return Err(AppError::Forbidden(msg::ADMIN_REQUIRED.into()));
    }

    request
        .extensions_mut()
        .insert(AdminContext { user, auth_method });
    Ok(next.run(request).await)
}
