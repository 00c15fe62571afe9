use serde::{Deserialize, Serialize};

/// Marker that a gateway event has been handled. Write-once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedEvent {
    pub event_id: String,
    pub event_type: String,
    pub processed_at: i64,
}
