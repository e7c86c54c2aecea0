//! Append-only audit writer for `payment_events`.
//!
//! Callers pass the connection of the transaction that performs the status
//! change, so the audit row and the change commit together or not at all.

use chrono::Utc;
use sqlx::SqliteConnection;

pub async fn record(
    conn: &mut SqliteConnection,
    transaction_id: i64,
    event_type: &str,
    previous_status: Option<&str>,
    new_status: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO payment_events \
             (transaction_id, event_type, previous_status, new_status, created_at) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(transaction_id)
    .bind(event_type)
    .bind(previous_status)
    .bind(new_status)
    .bind(Utc::now())
    .execute(conn)
    .await?;
    Ok(())
}
