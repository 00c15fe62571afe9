//! Shared helpers for request parsing and money conversion.

use axum::http::HeaderMap;

/// Extract a Bearer token from the Authorization header.
///
/// Returns the token string without the "Bearer " prefix, or None if
/// the header is missing, malformed, or empty after the prefix.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
}

/// Read a header as a trimmed, non-empty string.
pub fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
}

/// Convert a major-unit amount (rupees) to minor units (paise).
///
/// Rounds to the nearest paisa so `499.99` becomes `49999` rather than
/// `49998`. Returns None for non-finite, non-positive or out-of-range input.
pub fn to_minor_units(amount: f64) -> Option<i64> {
    if !amount.is_finite() || amount <= 0.0 {
        return None;
    }
    let minor = (amount * 100.0).round();
    if minor < 1.0 || minor > i64::MAX as f64 {
        return None;
    }
    Some(minor as i64)
}

/// Convert minor units back to a major-unit amount for responses.
pub fn to_major_units(minor: i64) -> f64 {
    minor as f64 / 100.0
}
