pub mod normalizer;
pub mod signature;

use serde::{Deserialize, Serialize};

use crate::models::Gateway;

/// Which sold counter a purchase advances.
///
/// Resolved exactly once, in the normalizer, from confirmation metadata.
/// Every downstream write site receives this as a required argument instead
/// of re-inspecting metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaleMode {
    Production,
    Test,
}

impl SaleMode {
    pub fn is_test(self) -> bool {
        matches!(self, SaleMode::Test)
    }
}

/// One purchased unit kind within a confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub ticket_type_id: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    /// Event slug the ticket admits to, e.g. `boulderfest-2026`.
    pub event_id: String,
    pub event_date: Option<String>,
}

/// Canonical shape both gateways normalize into. Pure data; producing one
/// has no side effects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentConfirmation {
    pub gateway: Gateway,
    pub gateway_order_id: String,
    pub gateway_capture_id: Option<String>,
    pub amount_cents: i64,
    pub currency: String,
    pub line_items: Vec<LineItem>,
    pub customer_email: String,
    pub customer_name: String,
    pub sale_mode: SaleMode,
    pub metadata: serde_json::Value,
}
