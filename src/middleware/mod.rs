mod admin_auth;

pub use admin_auth::*;

/// Tracks how a request was authenticated.
#[derive(Debug, Clone)]
pub struct AuthMethod {
    /// The API key ID (not the key itself)
    pub key_id: String,
    /// The visible key prefix (e.g., "tp_a1b2c3d4")
    pub key_prefix: String,
}
