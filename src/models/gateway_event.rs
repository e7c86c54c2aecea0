use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    Verified,
    Unverified,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    Pending,
    Processed,
    Failed,
}

/// One inbound webhook delivery.
///
/// `UNIQUE (gateway, event_id)` makes the insert itself the idempotency
/// check: the second delivery of the same event id loses at the database,
/// not in application code.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct GatewayEvent {
    pub id: i64,
    pub gateway: super::Gateway,
    pub event_id: String,
    pub event_type: String,
    pub payload: String,
    pub verification_status: VerificationStatus,
    pub processing_status: ProcessingStatus,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}
