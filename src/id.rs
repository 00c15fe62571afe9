//! Prefixed ID generation for tourpay entities.
//!
//! All IDs use a `tp_` brand prefix so they never collide with gateway IDs
//! (`order_`, `pay_`, `rfnd_`).
//!
//! Format: `tp_{entity}_{uuid_simple}` (32 hex chars, no hyphens)

use uuid::Uuid;

/// Entity types that have prefixed IDs.
#[derive(Debug, Clone, Copy)]
pub enum EntityType {
    User,
    Booking,
    ApiKey,
}

impl EntityType {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::User => "tp_usr",
            Self::Booking => "tp_bkg",
            Self::ApiKey => "tp_key",
        }
    }

    /// Generates a new prefixed ID for this entity type.
    pub fn gen_id(&self) -> String {
        format!("{}_{}", self.prefix(), Uuid::new_v4().as_simple())
    }
}
