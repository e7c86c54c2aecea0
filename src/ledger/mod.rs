//! Transaction ledger: the durable record of a purchase attempt and the only
//! code allowed to move its status.
//!
//! Transitions are monotonic (`pending -> completed -> refunded`, `pending ->
//! failed`) and every transition writes one `payment_events` row inside the
//! same SQL transaction as the status update.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use thiserror::Error;
use uuid::Uuid;

use crate::audit;
use crate::models::{Gateway, Transaction, TransactionStatus};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("order {gateway_order_id} already exists for {gateway}")]
    DuplicateOrder {
        gateway: Gateway,
        gateway_order_id: String,
    },

    #[error("transaction {0} not found")]
    NotFound(i64),

    #[error("invalid transition from {from} to {to}")]
    InvalidTransition {
        from: TransactionStatus,
        to: TransactionStatus,
    },

    #[error("storage error")]
    Database(#[from] sqlx::Error),
}

/// Input for opening a pending transaction when checkout starts.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub gateway: Gateway,
    pub gateway_order_id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub customer_email: String,
    pub customer_name: String,
    pub cart_json: String,
    pub metadata_json: String,
    pub is_test: bool,
}

/// Opens a `pending` transaction. Retrying session creation with the same
/// gateway order id is reported as `DuplicateOrder`, never as a second row.
pub async fn create_pending(pool: &SqlitePool, new: &NewTransaction) -> Result<i64, LedgerError> {
    let mut tx = pool.begin().await?;
    let now = Utc::now();

    let result = sqlx::query(
        "INSERT INTO transactions \
             (uuid, gateway, gateway_order_id, amount_cents, currency, status, \
              customer_email, customer_name, cart_json, metadata_json, is_test, \
              created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, 'pending', ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(new.gateway)
    .bind(&new.gateway_order_id)
    .bind(new.amount_cents)
    .bind(&new.currency)
    .bind(&new.customer_email)
    .bind(&new.customer_name)
    .bind(&new.cart_json)
    .bind(&new.metadata_json)
    .bind(new.is_test)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await;

    let transaction_id = match result {
        Ok(done) => done.last_insert_rowid(),
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            return Err(LedgerError::DuplicateOrder {
                gateway: new.gateway,
                gateway_order_id: new.gateway_order_id.clone(),
            });
        }
        Err(e) => return Err(e.into()),
    };

    audit::record(&mut tx, transaction_id, "transaction.created", None, "pending").await?;
    tx.commit().await?;

    tracing::info!(
        transaction_id,
        gateway = %new.gateway,
        order_id = %new.gateway_order_id,
        "pending transaction created"
    );
    Ok(transaction_id)
}

pub async fn get(pool: &SqlitePool, transaction_id: i64) -> Result<Transaction, LedgerError> {
    sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE id = ?")
        .bind(transaction_id)
        .fetch_optional(pool)
        .await?
        .ok_or(LedgerError::NotFound(transaction_id))
}

pub async fn find_by_order(
    pool: &SqlitePool,
    gateway: Gateway,
    gateway_order_id: &str,
) -> Result<Option<Transaction>, LedgerError> {
    Ok(sqlx::query_as::<_, Transaction>(
        "SELECT * FROM transactions WHERE gateway = ? AND gateway_order_id = ?",
    )
    .bind(gateway)
    .bind(gateway_order_id)
    .fetch_optional(pool)
    .await?)
}

/// `pending -> completed`. Takes the connection of an open transaction so
/// issuance can commit the status change atomically with ticket creation.
///
/// A retried capture (already `completed` with the same capture id) is a
/// no-op `Ok`; a different capture id on a completed row, or any call on a
/// refunded/failed row, is `InvalidTransition`.
pub async fn mark_completed(
    conn: &mut SqliteConnection,
    transaction_id: i64,
    capture_id: Option<&str>,
) -> Result<(), LedgerError> {
    let updated = sqlx::query(
        "UPDATE transactions \
         SET status = 'completed', gateway_capture_id = COALESCE(?, gateway_capture_id), \
             updated_at = ? \
         WHERE id = ? AND status = 'pending'",
    )
    .bind(capture_id)
    .bind(Utc::now())
    .bind(transaction_id)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    if updated == 1 {
        audit::record(conn, transaction_id, "payment.completed", Some("pending"), "completed")
            .await?;
        tracing::info!(transaction_id, ?capture_id, "transaction completed");
        return Ok(());
    }

    // Nothing matched: classify against the current row.
    let current = sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE id = ?")
        .bind(transaction_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(LedgerError::NotFound(transaction_id))?;

    match current.status {
        TransactionStatus::Completed
            if capture_id.is_none() || current.gateway_capture_id.as_deref() == capture_id =>
        {
            // Capture retried; converged already.
            Ok(())
        }
        from => Err(LedgerError::InvalidTransition {
            from,
            to: TransactionStatus::Completed,
        }),
    }
}

/// `completed -> refunded`.
pub async fn mark_refunded(pool: &SqlitePool, transaction_id: i64) -> Result<(), LedgerError> {
    transition_terminal(
        pool,
        transaction_id,
        TransactionStatus::Completed,
        TransactionStatus::Refunded,
        "payment.refunded",
    )
    .await
}

/// `pending -> failed`, for abandoned or definitively failed captures.
pub async fn mark_failed(pool: &SqlitePool, transaction_id: i64) -> Result<(), LedgerError> {
    transition_terminal(
        pool,
        transaction_id,
        TransactionStatus::Pending,
        TransactionStatus::Failed,
        "payment.failed",
    )
    .await
}

async fn transition_terminal(
    pool: &SqlitePool,
    transaction_id: i64,
    from: TransactionStatus,
    to: TransactionStatus,
    event_type: &str,
) -> Result<(), LedgerError> {
    let mut tx = pool.begin().await?;

    let updated = sqlx::query("UPDATE transactions SET status = ?, updated_at = ? WHERE id = ? AND status = ?")
        .bind(to)
        .bind(Utc::now())
        .bind(transaction_id)
        .bind(from)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    if updated != 1 {
        let current: Option<TransactionStatus> =
            sqlx::query_scalar("SELECT status FROM transactions WHERE id = ?")
                .bind(transaction_id)
                .fetch_optional(&mut *tx)
                .await?;
        return match current {
            None => Err(LedgerError::NotFound(transaction_id)),
            Some(status) => Err(LedgerError::InvalidTransition { from: status, to }),
        };
    }

    audit::record(&mut tx, transaction_id, event_type, Some(&from.to_string()), &to.to_string())
        .await?;
    tx.commit().await?;

    tracing::info!(transaction_id, %from, %to, "transaction status changed");
    Ok(())
}
