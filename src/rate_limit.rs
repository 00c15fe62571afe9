//! Per-IP rate limiting for the public payment endpoints.
//!
//! Tiers:
//! - Strict: /payments/orders (creates a gateway order per call)
//! - Standard: /payments/confirm (may fetch from the gateway)
//!
//! The webhook is authenticated by signature and the refund route by admin
//! key, so neither is IP-limited.
//!
//! Configure via environment variables (0 disables a tier):
//! - RATE_LIMIT_STRICT_RPM (default: 10)
//! - RATE_LIMIT_STANDARD_RPM (default: 30)

use std::sync::Arc;
use std::time::Duration;
use tower_governor::GovernorLayer;
use tower_governor::governor::GovernorConfigBuilder;

/// Rate limiter layer type alias using governor types directly
pub type RateLimitLayer = GovernorLayer<
    tower_governor::key_extractor::PeerIpKeyExtractor,
    governor::middleware::NoOpMiddleware<governor::clock::QuantaInstant>,
    axum::body::Body,
>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub strict_rpm: u32,
    pub standard_rpm: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            strict_rpm: 10,
            standard_rpm: 30,
        }
    }
}

impl RateLimitConfig {
    /// No limits. Used by tests, which have no peer address to key on.
    pub fn disabled() -> Self {
        Self {
            strict_rpm: 0,
            standard_rpm: 0,
        }
    }
}

/// Creates a rate limiter layer with the specified requests per minute.
/// Returns None when the limit is 0.
fn create_layer(requests_per_minute: u32) -> Option<RateLimitLayer> {
    if requests_per_minute == 0 {
        return None;
    }

    let period_secs = 60 / requests_per_minute as u64;
    let config = GovernorConfigBuilder::default()
        .period(Duration::from_secs(period_secs.max(1)))
        .burst_size(requests_per_minute)
        .finish()
        .expect("Failed to build rate limiter config");

    Some(GovernorLayer::new(Arc::new(config)))
}

/// Strict tier, for endpoints that create gateway orders.
pub fn strict_layer(requests_per_minute: u32) -> Option<RateLimitLayer> {
    create_layer(requests_per_minute)
}

/// Standard tier, for the confirmation path.
pub fn standard_layer(requests_per_minute: u32) -> Option<RateLimitLayer> {
    create_layer(requests_per_minute)
}
