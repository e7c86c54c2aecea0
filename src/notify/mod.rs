//! Confirmation-email delivery through a retrying queue.
//!
//! Entries move `pending -> sent` on success, or stay `pending` with an
//! exponentially pushed-back `next_retry_at` until `attempt_count` reaches
//! the maximum, when they become terminally `failed`. The sweep touches at
//! most one bounded batch per invocation and never looks at rows that are
//! not yet due.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use thiserror::Error;

use crate::models::{QueueStatus, RetryQueueEntry};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("storage error")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Error)]
#[error("delivery failed: {0}")]
pub struct DeliveryError(pub String);

/// One delivery attempt's input.
#[derive(Debug, Clone)]
pub struct EmailJob {
    pub transaction_id: i64,
    pub email: String,
    pub email_type: String,
}

/// Outbound delivery seam. The production implementation hands the message
/// to the mail infrastructure; tests script failure sequences.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, job: &EmailJob) -> Result<(), DeliveryError>;
}

/// Default mailer: records the delivery in the log and reports success.
/// Actual SMTP transport lives outside this pipeline.
pub struct TracingMailer;

#[async_trait]
impl Mailer for TracingMailer {
    async fn send(&self, job: &EmailJob) -> Result<(), DeliveryError> {
        tracing::info!(
            transaction_id = job.transaction_id,
            email = %job.email,
            email_type = %job.email_type,
            "confirmation email dispatched"
        );
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct NotifyConfig {
    /// First-retry delay; doubles per attempt.
    pub backoff_base: Duration,
    /// Ceiling for the computed backoff.
    pub backoff_cap: Duration,
    /// Attempts after which an entry is terminally failed.
    pub max_attempts: i64,
    /// Rows examined per sweep invocation.
    pub batch_size: i64,
    /// Budget for a single delivery attempt; overruns count as failures.
    pub attempt_timeout: std::time::Duration,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            backoff_base: Duration::seconds(60),
            backoff_cap: Duration::hours(6),
            max_attempts: 5,
            batch_size: 25,
            attempt_timeout: std::time::Duration::from_secs(10),
        }
    }
}

/// Counts reported by one sweep. Entries not yet due are simply absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub processed: u64,
    pub succeeded: u64,
    pub failed: u64,
}

/// Queues a confirmation email, due immediately.
pub async fn enqueue(
    pool: &SqlitePool,
    transaction_id: i64,
    email: &str,
    email_type: &str,
) -> Result<i64, NotifyError> {
    let now = Utc::now();
    let done = sqlx::query(
        "INSERT INTO retry_queue \
             (transaction_id, email, email_type, next_retry_at, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(transaction_id)
    .bind(email)
    .bind(email_type)
    .bind(now)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    tracing::info!(transaction_id, email, email_type, "notification enqueued");
    Ok(done.last_insert_rowid())
}

/// Runs one bounded sweep over due entries.
pub async fn sweep(
    pool: &SqlitePool,
    mailer: &dyn Mailer,
    config: &NotifyConfig,
) -> Result<SweepReport, NotifyError> {
    let due = sqlx::query_as::<_, RetryQueueEntry>(
        "SELECT * FROM retry_queue \
         WHERE status = 'pending' AND next_retry_at <= ? \
         ORDER BY next_retry_at \
         LIMIT ?",
    )
    .bind(Utc::now())
    .bind(config.batch_size)
    .fetch_all(pool)
    .await?;

    let mut report = SweepReport::default();

    for entry in due {
        report.processed += 1;
        let job = EmailJob {
            transaction_id: entry.transaction_id,
            email: entry.email.clone(),
            email_type: entry.email_type.clone(),
        };

        let attempt = tokio::time::timeout(config.attempt_timeout, mailer.send(&job)).await;
        let outcome = match attempt {
            Ok(result) => result,
            Err(_) => Err(DeliveryError("delivery attempt timed out".into())),
        };

        match outcome {
            Ok(()) => {
                mark_sent(pool, &entry).await?;
                report.succeeded += 1;
            }
            Err(err) => {
                let terminal = record_failure(pool, &entry, &err, config).await?;
                if terminal {
                    report.failed += 1;
                }
            }
        }
    }

    if report.processed > 0 {
        tracing::info!(
            processed = report.processed,
            succeeded = report.succeeded,
            failed = report.failed,
            "notification sweep finished"
        );
    }
    Ok(report)
}

/// `now + base * 2^attempts`, capped.
pub fn next_retry_at(
    now: DateTime<Utc>,
    attempt_count: i64,
    config: &NotifyConfig,
) -> DateTime<Utc> {
    let exponent = attempt_count.clamp(0, 30) as u32;
    let delay = config
        .backoff_base
        .checked_mul(2_i32.saturating_pow(exponent))
        .unwrap_or(config.backoff_cap)
        .min(config.backoff_cap);
    now + delay
}

async fn mark_sent(pool: &SqlitePool, entry: &RetryQueueEntry) -> Result<(), NotifyError> {
    sqlx::query(
        "UPDATE retry_queue \
         SET status = 'sent', attempt_count = attempt_count + 1, last_error = NULL, \
             updated_at = ? \
         WHERE id = ? AND status = 'pending'",
    )
    .bind(Utc::now())
    .bind(entry.id)
    .execute(pool)
    .await?;
    tracing::info!(entry_id = entry.id, transaction_id = entry.transaction_id, "notification sent");
    Ok(())
}

/// Returns true when the entry just became terminally failed.
async fn record_failure(
    pool: &SqlitePool,
    entry: &RetryQueueEntry,
    err: &DeliveryError,
    config: &NotifyConfig,
) -> Result<bool, NotifyError> {
    let now = Utc::now();
    let attempts = entry.attempt_count + 1;
    let terminal = attempts >= config.max_attempts;
    let status = if terminal {
        QueueStatus::Failed
    } else {
        QueueStatus::Pending
    };

    sqlx::query(
        "UPDATE retry_queue \
         SET status = ?, attempt_count = ?, last_error = ?, next_retry_at = ?, updated_at = ? \
         WHERE id = ? AND status = 'pending'",
    )
    .bind(status)
    .bind(attempts)
    .bind(err.to_string())
    .bind(next_retry_at(now, attempts, config))
    .bind(now)
    .bind(entry.id)
    .execute(pool)
    .await?;

    if terminal {
        tracing::warn!(
            entry_id = entry.id,
            transaction_id = entry.transaction_id,
            attempts,
            error = %err,
            "notification permanently failed"
        );
    } else {
        tracing::warn!(
            entry_id = entry.id,
            transaction_id = entry.transaction_id,
            attempts,
            error = %err,
            "notification attempt failed, will retry"
        );
    }
    Ok(terminal)
}
