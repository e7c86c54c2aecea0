//! Ticket issuance: turns a confirmed payment into ticket rows, atomically
//! and capacity-bounded.
//!
//! The capacity claim is one conditional UPDATE per line item whose WHERE
//! clause encodes the invariant (`sold_count + qty <= max_quantity`). Two
//! concurrent purchases of the last unit both reach the database; the
//! database admits one. There is no read-then-write anywhere on this path.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use thiserror::Error;
use uuid::Uuid;

use crate::gateway::{PaymentConfirmation, SaleMode};
use crate::ledger::{self, LedgerError};
use crate::models::{Transaction, TransactionStatus};

#[derive(Debug, Error)]
pub enum IssuanceError {
    #[error("transaction {0} not found")]
    NotFound(i64),

    #[error("ticket type {ticket_type_id} is sold out")]
    CapacityExceeded { ticket_type_id: String },

    #[error("unknown ticket type {ticket_type_id}")]
    UnknownTicketType { ticket_type_id: String },

    #[error("transaction {transaction_id} is {status}, cannot issue")]
    InvalidState {
        transaction_id: i64,
        status: TransactionStatus,
    },

    #[error(transparent)]
    Ledger(LedgerError),

    #[error("storage error")]
    Database(#[from] sqlx::Error),
}

impl From<LedgerError> for IssuanceError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::Database(db) => IssuanceError::Database(db),
            other => IssuanceError::Ledger(other),
        }
    }
}

/// Issues tickets for a confirmed payment. All-or-nothing: counters, ticket
/// rows, the ledger transition and its audit row commit together.
///
/// Effectively idempotent: re-invoked for an already-completed transaction it
/// returns the existing ticket ids and writes nothing.
pub async fn issue(
    pool: &SqlitePool,
    transaction_id: i64,
    confirmation: &PaymentConfirmation,
    mode: SaleMode,
) -> Result<Vec<String>, IssuanceError> {
    let mut tx = pool.begin().await?;

    let transaction =
        sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE id = ?")
            .bind(transaction_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(IssuanceError::NotFound(transaction_id))?;

    match transaction.status {
        TransactionStatus::Pending => {}
        TransactionStatus::Completed => {
            // Duplicate invocation after a successful issue; hand back what
            // already exists.
            let existing = ticket_ids_for(&mut tx, transaction_id).await?;
            tx.commit().await?;
            tracing::info!(transaction_id, "issue re-invoked on completed transaction");
            return Ok(existing);
        }
        status => {
            return Err(IssuanceError::InvalidState {
                transaction_id,
                status,
            });
        }
    }

    let mut ticket_ids = Vec::new();
    let now = Utc::now();

    for item in &confirmation.line_items {
        claim_capacity(&mut tx, &item.ticket_type_id, item.quantity, mode).await?;

        for _ in 0..item.quantity {
            let ticket_id = new_ticket_token();
            sqlx::query(
                "INSERT INTO tickets \
                     (ticket_id, transaction_id, ticket_type_id, event_id, price_cents, \
                      attendee_first_name, attendee_last_name, is_test, created_at, updated_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&ticket_id)
            .bind(transaction_id)
            .bind(&item.ticket_type_id)
            .bind(&item.event_id)
            .bind(item.unit_price_cents)
            .bind(first_name(&confirmation.customer_name))
            .bind(last_name(&confirmation.customer_name))
            .bind(mode.is_test())
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await?;
            ticket_ids.push(ticket_id);
        }
    }

    ledger::mark_completed(&mut tx, transaction_id, confirmation.gateway_capture_id.as_deref())
        .await?;
    tx.commit().await?;

    tracing::info!(
        transaction_id,
        tickets = ticket_ids.len(),
        test = mode.is_test(),
        "tickets issued"
    );
    Ok(ticket_ids)
}

/// The single conditional write that enforces capacity. `SaleMode` picks the
/// counter column once; test sales can never consume production inventory.
async fn claim_capacity(
    conn: &mut SqliteConnection,
    ticket_type_id: &str,
    quantity: i64,
    mode: SaleMode,
) -> Result<(), IssuanceError> {
    let now = Utc::now();
    let updated = match mode {
        SaleMode::Production => {
            sqlx::query(
                "UPDATE ticket_types \
                 SET sold_count = sold_count + ?, updated_at = ? \
                 WHERE id = ? AND (max_quantity IS NULL OR sold_count + ? <= max_quantity)",
            )
            .bind(quantity)
            .bind(now)
            .bind(ticket_type_id)
            .bind(quantity)
        }
        // Shadow counter: not capacity-bounded, and never mixed into the
        // availability shown to customers.
        SaleMode::Test => {
            sqlx::query(
                "UPDATE ticket_types \
                 SET test_sold_count = test_sold_count + ?, updated_at = ? \
                 WHERE id = ?",
            )
            .bind(quantity)
            .bind(now)
            .bind(ticket_type_id)
        }
    }
    .execute(&mut *conn)
    .await?
    .rows_affected();

    if updated == 1 {
        return Ok(());
    }

    // Zero rows: either the type does not exist or the claim would oversell.
    let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM ticket_types WHERE id = ?")
        .bind(ticket_type_id)
        .fetch_optional(&mut *conn)
        .await?;

    if exists.is_some() {
        Err(IssuanceError::CapacityExceeded {
            ticket_type_id: ticket_type_id.to_string(),
        })
    } else {
        Err(IssuanceError::UnknownTicketType {
            ticket_type_id: ticket_type_id.to_string(),
        })
    }
}

pub async fn ticket_ids_for(
    conn: &mut SqliteConnection,
    transaction_id: i64,
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar("SELECT ticket_id FROM tickets WHERE transaction_id = ? ORDER BY id")
        .bind(transaction_id)
        .fetch_all(conn)
        .await
}

/// Unguessable external token, e.g. `TKT-3f9c…` (128 bits of randomness).
fn new_ticket_token() -> String {
    format!("TKT-{}", Uuid::new_v4().simple())
}

fn first_name(full: &str) -> &str {
    full.split_whitespace().next().unwrap_or("")
}

fn last_name(full: &str) -> &str {
    full.trim()
        .split_once(char::is_whitespace)
        .map(|(_, rest)| rest.trim())
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticket_tokens_are_prefixed_and_distinct() {
        let a = new_ticket_token();
        let b = new_ticket_token();
        assert!(a.starts_with("TKT-"));
        assert_eq!(a.len(), 4 + 32);
        assert_ne!(a, b);
    }

    #[test]
    fn name_splitting() {
        assert_eq!(first_name("Ana Lopez"), "Ana");
        assert_eq!(last_name("Ana Lopez"), "Lopez");
        assert_eq!(first_name("Ana"), "Ana");
        assert_eq!(last_name("Ana"), "");
        assert_eq!(last_name("Ana de la Cruz"), "de la Cruz");
        assert_eq!(first_name(""), "");
    }
}
