use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

/// Payment processor a transaction originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Gateway {
    Stripe,
    Paypal,
}

impl fmt::Display for Gateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gateway::Stripe => write!(f, "stripe"),
            Gateway::Paypal => write!(f, "paypal"),
        }
    }
}

/// Lifecycle state of a purchase attempt.
///
/// Transitions are monotonic: `pending -> completed -> refunded`, with
/// `failed` as a terminal state reachable only from `pending`. There is no
/// path back to `pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Refunded,
    Failed,
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionStatus::Pending => write!(f, "pending"),
            TransactionStatus::Completed => write!(f, "completed"),
            TransactionStatus::Refunded => write!(f, "refunded"),
            TransactionStatus::Failed => write!(f, "failed"),
        }
    }
}

/// One purchase attempt. Rows are never deleted; test-mode purchases are
/// flagged with `is_test`, never split into a separate table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Transaction {
    pub id: i64,
    pub uuid: String,
    pub gateway: Gateway,
    pub gateway_order_id: String,
    pub gateway_capture_id: Option<String>,
    pub amount_cents: i64,
    pub currency: String,
    pub status: TransactionStatus,
    pub customer_email: String,
    pub customer_name: String,
    pub cart_json: String,
    pub metadata_json: String,
    pub is_test: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
