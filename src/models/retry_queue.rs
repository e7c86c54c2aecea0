use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    Pending,
    Sent,
    Failed,
}

/// One queued notification. `attempt_count` only increases; once the row
/// reaches `sent` or `failed` it is immutable apart from operator reads.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RetryQueueEntry {
    pub id: i64,
    pub transaction_id: i64,
    pub email: String,
    pub email_type: String,
    pub attempt_count: i64,
    pub next_retry_at: DateTime<Utc>,
    pub last_error: Option<String>,
    pub status: QueueStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
