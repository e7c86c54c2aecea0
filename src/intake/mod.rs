//! Idempotent gateway-event admission.
//!
//! The only duplicate check is the `UNIQUE (gateway, event_id)` constraint on
//! `gateway_events`: admission is an INSERT, and the losing side of a
//! concurrent redelivery fails at the database. No in-memory set survives
//! concurrent requests or process restarts, so none is used.

use chrono::Utc;
use sqlx::SqlitePool;

use crate::models::{Gateway, ProcessingStatus, VerificationStatus};

/// Outcome of admitting one inbound event. A duplicate is a success-shaped
/// no-op, not an error: the gateway gets a 2xx either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accepted { event_row_id: i64 },
    Duplicate,
}

pub async fn admit(
    pool: &SqlitePool,
    gateway: Gateway,
    event_id: &str,
    event_type: &str,
    payload: &str,
    verification: VerificationStatus,
) -> Result<Admission, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO gateway_events \
             (gateway, event_id, event_type, payload, verification_status, created_at) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(gateway)
    .bind(event_id)
    .bind(event_type)
    .bind(payload)
    .bind(verification)
    .bind(Utc::now())
    .execute(pool)
    .await;

    match result {
        Ok(done) => {
            tracing::info!(%gateway, event_id, event_type, "gateway event admitted");
            Ok(Admission::Accepted {
                event_row_id: done.last_insert_rowid(),
            })
        }
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            reclaim_failed(pool, gateway, event_id).await
        }
        Err(e) => Err(e),
    }
}

/// A redelivery whose earlier processing attempt ended `failed` must be
/// allowed through, so the gateway's automatic retry can repair a customer
/// whose issuance failed transiently. The conditional UPDATE lets exactly
/// one retrier reclaim the row; everything else is a duplicate.
async fn reclaim_failed(
    pool: &SqlitePool,
    gateway: Gateway,
    event_id: &str,
) -> Result<Admission, sqlx::Error> {
    let reclaimed: Option<i64> = sqlx::query_scalar(
        "UPDATE gateway_events \
         SET processing_status = 'pending', last_error = NULL \
         WHERE gateway = ? AND event_id = ? AND processing_status = 'failed' \
         RETURNING id",
    )
    .bind(gateway)
    .bind(event_id)
    .fetch_optional(pool)
    .await?;

    match reclaimed {
        Some(event_row_id) => {
            tracing::info!(%gateway, event_id, "reclaimed failed gateway event for retry");
            Ok(Admission::Accepted { event_row_id })
        }
        None => {
            tracing::info!(%gateway, event_id, "duplicate gateway event suppressed");
            Ok(Admission::Duplicate)
        }
    }
}

/// Closes out an admitted event after downstream processing succeeded.
pub async fn mark_processed(pool: &SqlitePool, event_row_id: i64) -> Result<(), sqlx::Error> {
    set_processing_status(pool, event_row_id, ProcessingStatus::Processed, None).await
}

/// Records a downstream processing failure on the event row. A later
/// redelivery of the same event id may reclaim a failed row (see
/// `reclaim_failed`).
pub async fn mark_failed(
    pool: &SqlitePool,
    event_row_id: i64,
    error: &str,
) -> Result<(), sqlx::Error> {
    set_processing_status(pool, event_row_id, ProcessingStatus::Failed, Some(error)).await
}

async fn set_processing_status(
    pool: &SqlitePool,
    event_row_id: i64,
    status: ProcessingStatus,
    error: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE gateway_events \
         SET processing_status = ?, last_error = ?, processed_at = ? \
         WHERE id = ?",
    )
    .bind(status)
    .bind(error)
    .bind(Utc::now())
    .bind(event_row_id)
    .execute(pool)
    .await?;
    Ok(())
}
