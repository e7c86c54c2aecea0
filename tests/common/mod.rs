//! Shared fixtures: an in-memory store with the real schema, seeded
//! inventory, and scripted mailers.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use boxoffice_server::gateway::{LineItem, PaymentConfirmation, SaleMode};
use boxoffice_server::ledger::{self, NewTransaction};
use boxoffice_server::models::Gateway;
use boxoffice_server::notify::{DeliveryError, EmailJob, Mailer};

/// One connection so every task shares the same in-memory database; the
/// pool serializes access the way a single SQLite writer would.
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("open in-memory database");
    sqlx::migrate!().run(&pool).await.expect("apply migrations");
    pool
}

pub async fn seed_ticket_type(
    pool: &SqlitePool,
    id: &str,
    max_quantity: Option<i64>,
    sold_count: i64,
) {
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO ticket_types \
             (id, event_id, name, price_cents, sold_count, max_quantity, created_at, updated_at) \
         VALUES (?, 'boulderfest-2026', ?, 12500, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(id)
    .bind(sold_count)
    .bind(max_quantity)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .expect("seed ticket type");
}

pub async fn sold_count(pool: &SqlitePool, id: &str) -> i64 {
    sqlx::query_scalar("SELECT sold_count FROM ticket_types WHERE id = ?")
        .bind(id)
        .fetch_one(pool)
        .await
        .expect("read sold_count")
}

pub async fn test_sold_count(pool: &SqlitePool, id: &str) -> i64 {
    sqlx::query_scalar("SELECT test_sold_count FROM ticket_types WHERE id = ?")
        .bind(id)
        .fetch_one(pool)
        .await
        .expect("read test_sold_count")
}

pub fn line_item(ticket_type_id: &str, quantity: i64) -> LineItem {
    LineItem {
        ticket_type_id: ticket_type_id.to_string(),
        quantity,
        unit_price_cents: 12500,
        event_id: "boulderfest-2026".to_string(),
        event_date: Some("2026-05-15".to_string()),
    }
}

pub fn confirmation(order_id: &str, items: Vec<LineItem>) -> PaymentConfirmation {
    let amount_cents = items.iter().map(|i| i.quantity * i.unit_price_cents).sum();
    PaymentConfirmation {
        gateway: Gateway::Stripe,
        gateway_order_id: order_id.to_string(),
        gateway_capture_id: Some(format!("pi_{order_id}")),
        amount_cents,
        currency: "USD".to_string(),
        line_items: items,
        customer_email: "ana@example.com".to_string(),
        customer_name: "Ana Lopez".to_string(),
        sale_mode: SaleMode::Production,
        metadata: serde_json::Value::Null,
    }
}

pub async fn pending_transaction(pool: &SqlitePool, order_id: &str) -> i64 {
    ledger::create_pending(
        pool,
        &NewTransaction {
            gateway: Gateway::Stripe,
            gateway_order_id: order_id.to_string(),
            amount_cents: 25000,
            currency: "USD".to_string(),
            customer_email: "ana@example.com".to_string(),
            customer_name: "Ana Lopez".to_string(),
            cart_json: "[]".to_string(),
            metadata_json: "{}".to_string(),
            is_test: false,
        },
    )
    .await
    .expect("create pending transaction")
}

/// Inserts a valid ticket directly, bypassing issuance.
pub async fn seed_ticket(pool: &SqlitePool, transaction_id: i64, token: &str, max_scans: i64) {
    let now = Utc::now();
    // Satisfy the tickets.ticket_type_id foreign key; keeps any row a test
    // already seeded with specific capacity.
    sqlx::query(
        "INSERT OR IGNORE INTO ticket_types \
             (id, event_id, name, price_cents, created_at, updated_at) \
         VALUES ('weekend-pass', 'boulderfest-2026', 'weekend-pass', 12500, ?, ?)",
    )
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .expect("seed ticket type for ticket");
    sqlx::query(
        "INSERT INTO tickets \
             (ticket_id, transaction_id, ticket_type_id, event_id, price_cents, \
              max_scan_count, created_at, updated_at) \
         VALUES (?, ?, 'weekend-pass', 'boulderfest-2026', 12500, ?, ?, ?)",
    )
    .bind(token)
    .bind(transaction_id)
    .bind(max_scans)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .expect("seed ticket");
}

/// Fails the first `failures` sends, then succeeds.
pub struct ScriptedMailer {
    failures: u32,
    calls: AtomicU32,
}

impl ScriptedMailer {
    pub fn failing_first(failures: u32) -> Self {
        Self {
            failures,
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Mailer for ScriptedMailer {
    async fn send(&self, _job: &EmailJob) -> Result<(), DeliveryError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.failures {
            Err(DeliveryError(format!("smtp refused (attempt {})", n + 1)))
        } else {
            Ok(())
        }
    }
}

/// Never completes within any reasonable attempt timeout.
pub struct StalledMailer;

#[async_trait]
impl Mailer for StalledMailer {
    async fn send(&self, _job: &EmailJob) -> Result<(), DeliveryError> {
        tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        Ok(())
    }
}
