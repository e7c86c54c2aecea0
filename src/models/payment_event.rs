use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Append-only audit record, one row per ledger status transition.
/// Written in the same SQL transaction as the transition it describes.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PaymentEvent {
    pub id: i64,
    pub transaction_id: i64,
    pub event_type: String,
    pub previous_status: Option<String>,
    pub new_status: String,
    pub created_at: DateTime<Utc>,
}
