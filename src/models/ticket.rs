use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RegistrationStatus {
    Pending,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TicketValidity {
    Valid,
    Revoked,
}

/// Inventory definition for one sellable ticket kind.
///
/// `sold_count` and `test_sold_count` are advanced only through the
/// conditional UPDATE in the issuance engine; production and test sales
/// never touch the same counter.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TicketType {
    pub id: String,
    pub event_id: String,
    pub name: String,
    pub price_cents: i64,
    pub sold_count: i64,
    pub test_sold_count: i64,
    pub max_quantity: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One admission unit. `ticket_id` is the unguessable token shown to the
/// attendee and scanned at the gate.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Ticket {
    pub id: i64,
    pub ticket_id: String,
    pub transaction_id: i64,
    pub ticket_type_id: String,
    pub event_id: String,
    pub price_cents: i64,
    pub attendee_first_name: String,
    pub attendee_last_name: String,
    pub registration_status: RegistrationStatus,
    pub validity: TicketValidity,
    pub scan_count: i64,
    pub max_scan_count: i64,
    pub is_test: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
