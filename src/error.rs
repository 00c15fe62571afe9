use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// User-facing error messages shared across handlers.
pub mod msg {
    pub const USER_ID_REQUIRED: &str = "userId is required";
    pub const CUSTOMER_NAME_REQUIRED: &str = "Customer name is required";
    pub const CUSTOMER_PHONE_REQUIRED: &str = "Customer phone is required";
    pub const PICKUP_LOCATION_REQUIRED: &str = "Pickup location is required";
    pub const INVALID_EMAIL_FORMAT: &str = "Invalid email format";
    pub const INVALID_PARTICIPANTS: &str = "At least one participant is required";
    pub const INVALID_TOTAL_AMOUNT: &str = "totalAmount must be greater than zero";
    pub const INVALID_DATE_RANGE: &str = "endDate must not be before startDate";
    pub const PAYMENT_ID_REQUIRED: &str = "paymentId is required";
    pub const ORDER_ID_REQUIRED: &str = "orderId is required";
    pub const INVALID_REFUND_AMOUNT: &str = "Refund amount must be greater than zero";
    pub const INVALID_PAYMENT_SIGNATURE: &str = "Invalid payment signature";
    pub const PAYMENT_NOT_CAPTURED: &str = "Payment has not been captured for this order";
    pub const GATEWAY_NOT_CONFIGURED: &str = "Payment gateway credentials are not configured";
    pub const GATEWAY_UNREACHABLE: &str = "Payment gateway is unreachable";
    pub const ORDER_NOT_FOUND: &str = "Order not found";
    pub const PAYMENT_NOT_FOUND: &str = "Payment not found";
    pub const ADMIN_REQUIRED: &str = "Administrator role required";
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid argument: {0}")]
    BadRequest(String),

    #[error("Unauthenticated")]
    Unauthorized,

    #[error("Permission denied: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Failed precondition: {0}")]
    FailedPrecondition(String),

    /// A payment or booking link that must exist is missing.
    #[error("Data integrity error: {0}")]
    DataIntegrity(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable error code returned to callers.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => "invalid-argument",
            AppError::Unauthorized => "unauthenticated",
            AppError::Forbidden(_) => "permission-denied",
            AppError::NotFound(_) => "not-found",
            AppError::FailedPrecondition(_) => "failed-precondition",
            AppError::DataIntegrity(_) => "data-integrity",
            AppError::Database(_) | AppError::Pool(_) | AppError::Internal(_) => "internal",
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.code();
        let (status, error, details) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "Bad request", Some(msg.clone())),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized", None),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "Forbidden", Some(msg.clone())),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "Not found", Some(msg.clone())),
            AppError::FailedPrecondition(msg) => (
                StatusCode::PRECONDITION_FAILED,
                "Failed precondition",
                Some(msg.clone()),
            ),
            AppError::DataIntegrity(msg) => {
                tracing::error!("Data integrity error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
            AppError::Pool(e) => {
                tracing::error!("Pool error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            code,
            details,
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Turns `Option` lookups into `NotFound` errors.
pub trait OptionExt<T> {
    fn or_not_found(self, message: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn or_not_found(self, message: &str) -> Result<T> {
        self.ok_or_else(|| AppError::NotFound(message.to_string()))
    }
}
