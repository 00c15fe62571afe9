//! Hashing and message authentication helpers.
//!
//! Used for:
//! - API key storage (salted SHA-256, only the hash is persisted)
//! - Gateway webhook signatures (HMAC-SHA256 over the raw request body)
//! - Checkout confirmation signatures (HMAC-SHA256 over `order_id|payment_id`)

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Hash a secret for database lookups (API keys).
/// Uses SHA-256 with application salt, returns lowercase hex string.
pub fn hash_secret(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"tourpay-v1:");
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Generate a new bearer API key. Only its hash is ever stored.
pub fn generate_api_key() -> String {
    format!("tp_{}", Uuid::new_v4().as_simple())
}

/// Compute a lowercase hex HMAC-SHA256 of `payload` keyed by `secret`.
pub fn hmac_sha256_hex(secret: &[u8], payload: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Compare a computed signature against a claimed one.
///
/// Exact match: lengths must agree, then bytes are compared in constant time.
pub fn signatures_match(expected: &str, provided: &str) -> bool {
    let expected = expected.as_bytes();
    let provided = provided.as_bytes();

    // Signature length is not secret (always 64 hex chars for SHA-256)
    if expected.len() != provided.len() {
        return false;
    }

    expected.ct_eq(provided).into()
}
