//! Check-in validation at the gate.
//!
//! The admitting path is one conditional UPDATE whose WHERE clause carries
//! the scan-limit invariant: two concurrent scans of a ticket with one slot
//! left both reach the database, and the database admits one. Business
//! rejections (limit reached, revoked, unknown token) are outcome values,
//! never errors.

use chrono::Utc;
use serde::Serialize;
use sqlx::SqlitePool;
use thiserror::Error;

use crate::models::{Ticket, TicketValidity};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ScanOutcome {
    Admitted { scan_count: i64 },
    LimitExceeded { scan_count: i64 },
    Revoked,
    NotFound,
}

impl ScanOutcome {
    pub fn is_admitted(&self) -> bool {
        matches!(self, ScanOutcome::Admitted { .. })
    }
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("storage error")]
    Database(#[from] sqlx::Error),
}

/// Validates a ticket token, consuming one scan slot unless `validate_only`.
///
/// The dry-run path reads without mutating, so a preview is indistinguishable
/// from not having scanned at all.
pub async fn validate(
    pool: &SqlitePool,
    token: &str,
    validate_only: bool,
) -> Result<ScanOutcome, ScanError> {
    if validate_only {
        return preview(pool, token).await;
    }

    let new_count: Option<i64> = sqlx::query_scalar(
        "UPDATE tickets \
         SET scan_count = scan_count + 1, updated_at = ? \
         WHERE ticket_id = ? AND validity = 'valid' AND scan_count < max_scan_count \
         RETURNING scan_count",
    )
    .bind(Utc::now())
    .bind(token)
    .fetch_optional(pool)
    .await?;

    if let Some(scan_count) = new_count {
        tracing::info!(token, scan_count, "ticket scanned");
        return Ok(ScanOutcome::Admitted { scan_count });
    }

    // The conditional update rejected; re-read to say why.
    let outcome = preview(pool, token).await?;
    tracing::info!(token, ?outcome, "scan rejected");
    Ok(outcome)
}

/// Revokes a ticket so further scans are rejected. Companion to the refund
/// flow; idempotent.
pub async fn revoke(pool: &SqlitePool, token: &str) -> Result<ScanOutcome, ScanError> {
    let updated = sqlx::query(
        "UPDATE tickets SET validity = 'revoked', updated_at = ? WHERE ticket_id = ?",
    )
    .bind(Utc::now())
    .bind(token)
    .execute(pool)
    .await?
    .rows_affected();

    if updated == 0 {
        return Ok(ScanOutcome::NotFound);
    }
    tracing::info!(token, "ticket revoked");
    Ok(ScanOutcome::Revoked)
}

async fn preview(pool: &SqlitePool, token: &str) -> Result<ScanOutcome, ScanError> {
    let ticket = sqlx::query_as::<_, Ticket>("SELECT * FROM tickets WHERE ticket_id = ?")
        .bind(token)
        .fetch_optional(pool)
        .await?;

    let Some(ticket) = ticket else {
        return Ok(ScanOutcome::NotFound);
    };

    Ok(match ticket.validity {
        TicketValidity::Revoked => ScanOutcome::Revoked,
        TicketValidity::Valid if ticket.scan_count < ticket.max_scan_count => {
            ScanOutcome::Admitted {
                scan_count: ticket.scan_count,
            }
        }
        TicketValidity::Valid => ScanOutcome::LimitExceeded {
            scan_count: ticket.scan_count,
        },
    })
}
