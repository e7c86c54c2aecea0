//! Adapts heterogeneous gateway payloads into one canonical
//! [`PaymentConfirmation`]. Pure transforms: no storage access, no side
//! effects, and missing optional fields become sentinels rather than errors.

use serde_json::Value;
use thiserror::Error;

use super::{LineItem, PaymentConfirmation, SaleMode};
use crate::models::Gateway;

/// Name substituted when the gateway did not supply one.
pub const UNKNOWN_CUSTOMER: &str = "Guest";

/// Event slug substituted when product metadata carries none.
pub const UNASSIGNED_EVENT: &str = "unassigned";

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("malformed {gateway} payload: {reason}")]
    MalformedPayload { gateway: Gateway, reason: String },
}

impl NormalizeError {
    fn new(gateway: Gateway, reason: impl Into<String>) -> Self {
        NormalizeError::MalformedPayload {
            gateway,
            reason: reason.into(),
        }
    }
}

/// Extracts the gateway-assigned event id and event type from a raw webhook
/// envelope, before any processing decision is made.
pub fn event_identity(gateway: Gateway, payload: &Value) -> Result<(String, String), NormalizeError> {
    let event_id = payload
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| NormalizeError::new(gateway, "missing event id"))?;
    let event_type = match gateway {
        Gateway::Stripe => payload.get("type").and_then(Value::as_str),
        Gateway::Paypal => payload.get("event_type").and_then(Value::as_str),
    }
    .ok_or_else(|| NormalizeError::new(gateway, "missing event type"))?;
    Ok((event_id.to_string(), event_type.to_string()))
}

/// Event types that represent a completed payment and should drive issuance.
pub fn is_payment_completed(gateway: Gateway, event_type: &str) -> bool {
    match gateway {
        Gateway::Stripe => event_type == "checkout.session.completed",
        Gateway::Paypal => {
            event_type == "PAYMENT.CAPTURE.COMPLETED" || event_type == "CHECKOUT.ORDER.APPROVED"
        }
    }
}

pub fn normalize(gateway: Gateway, payload: &Value) -> Result<PaymentConfirmation, NormalizeError> {
    match gateway {
        Gateway::Stripe => normalize_stripe(payload),
        Gateway::Paypal => normalize_paypal(payload),
    }
}

/// `checkout.session.completed` envelope with the session object under
/// `data.object` and line items expanded under `line_items.data`.
fn normalize_stripe(payload: &Value) -> Result<PaymentConfirmation, NormalizeError> {
    let gw = Gateway::Stripe;
    let session = payload
        .pointer("/data/object")
        .ok_or_else(|| NormalizeError::new(gw, "missing data.object"))?;

    let order_id = required_str(gw, session, "id", "session id")?;
    let capture_id = session
        .get("payment_intent")
        .and_then(Value::as_str)
        .map(str::to_string);
    let amount_cents = session
        .get("amount_total")
        .and_then(Value::as_i64)
        .ok_or_else(|| NormalizeError::new(gw, "missing amount_total"))?;
    let currency = session
        .get("currency")
        .and_then(Value::as_str)
        .unwrap_or("usd")
        .to_uppercase();

    let customer_email = session
        .pointer("/customer_details/email")
        .and_then(Value::as_str)
        .ok_or_else(|| NormalizeError::new(gw, "missing customer email"))?
        .to_string();
    let customer_name = session
        .pointer("/customer_details/name")
        .and_then(Value::as_str)
        .unwrap_or(UNKNOWN_CUSTOMER)
        .to_string();

    let metadata = session.get("metadata").cloned().unwrap_or(Value::Null);
    let sale_mode = sale_mode_from_metadata(&metadata);

    let items = session
        .pointer("/line_items/data")
        .and_then(Value::as_array)
        .ok_or_else(|| NormalizeError::new(gw, "missing line_items.data"))?;

    let mut line_items = Vec::with_capacity(items.len());
    for item in items {
        let quantity = item
            .get("quantity")
            .and_then(Value::as_i64)
            .filter(|q| *q > 0)
            .ok_or_else(|| NormalizeError::new(gw, "line item missing quantity"))?;
        let unit_price_cents = item
            .pointer("/price/unit_amount")
            .and_then(Value::as_i64)
            .ok_or_else(|| NormalizeError::new(gw, "line item missing unit_amount"))?;
        let product_meta = item.pointer("/price/product/metadata");
        let ticket_type_id = product_meta
            .and_then(|m| m.get("ticket_type"))
            .and_then(Value::as_str)
            .ok_or_else(|| NormalizeError::new(gw, "line item missing ticket_type metadata"))?
            .to_string();
        let event_id = product_meta
            .and_then(|m| m.get("event_id"))
            .and_then(Value::as_str)
            .unwrap_or(UNASSIGNED_EVENT)
            .to_string();
        let event_date = product_meta
            .and_then(|m| m.get("event_date"))
            .and_then(Value::as_str)
            .map(str::to_string);

        line_items.push(LineItem {
            ticket_type_id,
            quantity,
            unit_price_cents,
            event_id,
            event_date,
        });
    }

    Ok(PaymentConfirmation {
        gateway: gw,
        gateway_order_id: order_id,
        gateway_capture_id: capture_id,
        amount_cents,
        currency,
        line_items,
        customer_email,
        customer_name,
        sale_mode,
        metadata,
    })
}

/// Order-capture envelope: the capture under `resource`, line items under
/// `resource/purchase_units/0/items`, amounts as decimal strings.
fn normalize_paypal(payload: &Value) -> Result<PaymentConfirmation, NormalizeError> {
    let gw = Gateway::Paypal;
    let resource = payload
        .get("resource")
        .ok_or_else(|| NormalizeError::new(gw, "missing resource"))?;

    let capture_id = required_str(gw, resource, "id", "capture id")?;
    let order_id = resource
        .pointer("/supplementary_data/related_ids/order_id")
        .and_then(Value::as_str)
        .map(str::to_string)
        // Order-approved events carry the order id directly.
        .unwrap_or_else(|| capture_id.clone());

    let amount = resource
        .get("amount")
        .ok_or_else(|| NormalizeError::new(gw, "missing amount"))?;
    let amount_cents = decimal_to_cents(gw, amount.get("value").and_then(Value::as_str))?;
    let currency = amount
        .get("currency_code")
        .and_then(Value::as_str)
        .unwrap_or("USD")
        .to_string();

    let payer = payload.get("resource").and_then(|r| r.get("payer"));
    let customer_email = payer
        .and_then(|p| p.get("email_address"))
        .and_then(Value::as_str)
        .ok_or_else(|| NormalizeError::new(gw, "missing payer email"))?
        .to_string();
    let customer_name = payer
        .and_then(|p| p.pointer("/name/given_name"))
        .and_then(Value::as_str)
        .unwrap_or(UNKNOWN_CUSTOMER)
        .to_string();

    // custom_id carries a JSON metadata object when the checkout set one.
    let metadata = resource
        .get("custom_id")
        .and_then(Value::as_str)
        .and_then(|raw| serde_json::from_str(raw).ok())
        .unwrap_or(Value::Null);
    let sale_mode = sale_mode_from_metadata(&metadata);

    let items = resource
        .pointer("/purchase_units/0/items")
        .and_then(Value::as_array)
        .ok_or_else(|| NormalizeError::new(gw, "missing purchase unit items"))?;

    let mut line_items = Vec::with_capacity(items.len());
    for item in items {
        let quantity = item
            .get("quantity")
            .and_then(as_i64_or_numeric_str)
            .filter(|q| *q > 0)
            .ok_or_else(|| NormalizeError::new(gw, "item missing quantity"))?;
        let unit_price_cents =
            decimal_to_cents(gw, item.pointer("/unit_amount/value").and_then(Value::as_str))?;
        let ticket_type_id = item
            .get("sku")
            .and_then(Value::as_str)
            .ok_or_else(|| NormalizeError::new(gw, "item missing sku"))?
            .to_string();
        let event_id = item
            .get("category")
            .and_then(Value::as_str)
            .unwrap_or(UNASSIGNED_EVENT)
            .to_string();
        let event_date = item
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string);

        line_items.push(LineItem {
            ticket_type_id,
            quantity,
            unit_price_cents,
            event_id,
            event_date,
        });
    }

    Ok(PaymentConfirmation {
        gateway: gw,
        gateway_order_id: order_id,
        gateway_capture_id: Some(capture_id),
        amount_cents,
        currency,
        line_items,
        customer_email,
        customer_name,
        sale_mode,
        metadata,
    })
}

/// Explicit `test: true` (bool or string) selects the shadow counters;
/// anything else, including absent metadata, is a production sale.
fn sale_mode_from_metadata(metadata: &Value) -> SaleMode {
    let flagged = match metadata.get("test") {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s == "true",
        _ => false,
    };
    if flagged {
        SaleMode::Test
    } else {
        SaleMode::Production
    }
}

fn required_str(
    gateway: Gateway,
    value: &Value,
    key: &str,
    what: &str,
) -> Result<String, NormalizeError> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| NormalizeError::new(gateway, format!("missing {what}")))
}

fn as_i64_or_numeric_str(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// `"125.00"` -> `12500`. Rejects anything that is not a non-negative
/// decimal with at most two fraction digits.
fn decimal_to_cents(gateway: Gateway, value: Option<&str>) -> Result<i64, NormalizeError> {
    let raw = value.ok_or_else(|| NormalizeError::new(gateway, "missing amount value"))?;
    let (whole, frac) = match raw.split_once('.') {
        Some((w, f)) => (w, f),
        None => (raw, ""),
    };
    if whole.is_empty() || frac.len() > 2 || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(NormalizeError::new(gateway, format!("bad amount '{raw}'")));
    }
    let dollars: i64 = whole
        .parse()
        .map_err(|_| NormalizeError::new(gateway, format!("bad amount '{raw}'")))?;
    if dollars < 0 {
        return Err(NormalizeError::new(gateway, format!("bad amount '{raw}'")));
    }
    let cents: i64 = if frac.is_empty() {
        0
    } else {
        // "5" means 50 cents, "05" means 5.
        let parsed: i64 = frac.parse().expect("digits checked above");
        if frac.len() == 1 {
            parsed * 10
        } else {
            parsed
        }
    };
    Ok(dollars * 100 + cents)
}
