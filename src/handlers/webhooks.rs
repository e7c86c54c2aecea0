//! Gateway webhook endpoints.
//!
//! Response contract: 200 on accept-or-duplicate, 401 on signature failure,
//! 400 on a malformed envelope, 500 only for genuine processing faults (the
//! gateway retries on non-2xx, and intake idempotency makes that retry safe).

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde::Serialize;

use crate::gateway::{normalizer, signature, PaymentConfirmation};
use crate::intake::{self, Admission};
use crate::issuance::{self, IssuanceError};
use crate::ledger::{self, LedgerError, NewTransaction};
use crate::models::{Gateway, VerificationStatus};
use crate::notify;
use crate::utils::error::AppError;
use crate::utils::response::success;
use crate::AppState;

#[derive(Serialize)]
struct WebhookAck {
    accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    ticket_ids: Option<Vec<String>>,
}

pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let header = header_str(&headers, "stripe-signature")?;
    signature::verify_stripe(&state.config.stripe_webhook_secret, header, &body, Utc::now())
        .map_err(|e| AppError::SignatureInvalid(e.to_string()))?;
    process(state, Gateway::Stripe, &body).await
}

pub async fn paypal_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let header = header_str(&headers, "paypal-transmission-sig")?;
    signature::verify_paypal(&state.config.paypal_webhook_secret, header, &body)
        .map_err(|e| AppError::SignatureInvalid(e.to_string()))?;
    process(state, Gateway::Paypal, &body).await
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, AppError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::SignatureInvalid(format!("missing {name} header")))
}

/// Shared pipeline behind both endpoints: admit, normalize, resolve the
/// ledger row, issue, enqueue the confirmation.
async fn process(state: AppState, gateway: Gateway, body: &[u8]) -> Result<Response, AppError> {
    let payload: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| AppError::MalformedPayload(format!("invalid JSON body: {e}")))?;
    let (event_id, event_type) = normalizer::event_identity(gateway, &payload)
        .map_err(|e| AppError::MalformedPayload(e.to_string()))?;

    let admission = intake::admit(
        &state.pool,
        gateway,
        &event_id,
        &event_type,
        &payload.to_string(),
        VerificationStatus::Verified,
    )
    .await?;

    let event_row_id = match admission {
        Admission::Duplicate => {
            return Ok(success(
                WebhookAck {
                    accepted: false,
                    ticket_ids: None,
                },
                "Duplicate event ignored",
            )
            .into_response());
        }
        Admission::Accepted { event_row_id } => event_row_id,
    };

    if !normalizer::is_payment_completed(gateway, &event_type) {
        intake::mark_processed(&state.pool, event_row_id).await?;
        tracing::info!(%gateway, event_id, event_type, "event acknowledged without action");
        return Ok(success(
            WebhookAck {
                accepted: true,
                ticket_ids: None,
            },
            "Event acknowledged",
        )
        .into_response());
    }

    let confirmation = match normalizer::normalize(gateway, &payload) {
        Ok(c) => c,
        Err(e) => {
            intake::mark_failed(&state.pool, event_row_id, &e.to_string()).await?;
            return Err(AppError::MalformedPayload(e.to_string()));
        }
    };

    let transaction_id = match resolve_transaction(&state, &confirmation).await {
        Ok(id) => id,
        Err(e) => {
            intake::mark_failed(&state.pool, event_row_id, &e.to_string()).await?;
            return Err(e);
        }
    };

    match issuance::issue(&state.pool, transaction_id, &confirmation, confirmation.sale_mode).await
    {
        Ok(ticket_ids) => {
            intake::mark_processed(&state.pool, event_row_id).await?;

            // Outside the committed transaction on purpose: tickets are the
            // source of truth, notification failure is retried on its own.
            if let Err(e) = notify::enqueue(
                &state.pool,
                transaction_id,
                &confirmation.customer_email,
                "order-confirmation",
            )
            .await
            {
                tracing::error!(transaction_id, error = %e, "failed to enqueue confirmation");
            }

            Ok(success(
                WebhookAck {
                    accepted: true,
                    ticket_ids: Some(ticket_ids),
                },
                "Payment fulfilled",
            )
            .into_response())
        }
        Err(e) => {
            intake::mark_failed(&state.pool, event_row_id, &e.to_string()).await?;
            match e {
                IssuanceError::Database(db) => Err(AppError::DatabaseError(db)),
                // Capacity, unknown type and ordering faults are processing
                // failures from the gateway's point of view; a 5xx makes it
                // redeliver, and the reclaimed event row lets the retry run.
                other => Err(AppError::InternalServerError(other.to_string())),
            }
        }
    }
}

/// Finds the pending transaction opened at checkout, or creates it from the
/// confirmation when the create-session call never reached us.
async fn resolve_transaction(
    state: &AppState,
    confirmation: &PaymentConfirmation,
) -> Result<i64, AppError> {
    if let Some(existing) =
        ledger::find_by_order(&state.pool, confirmation.gateway, &confirmation.gateway_order_id)
            .await
            .map_err(ledger_fault)?
    {
        return Ok(existing.id);
    }

    tracing::warn!(
        gateway = %confirmation.gateway,
        order_id = %confirmation.gateway_order_id,
        "no pending transaction for confirmed payment, creating one"
    );

    let new = NewTransaction {
        gateway: confirmation.gateway,
        gateway_order_id: confirmation.gateway_order_id.clone(),
        amount_cents: confirmation.amount_cents,
        currency: confirmation.currency.clone(),
        customer_email: confirmation.customer_email.clone(),
        customer_name: confirmation.customer_name.clone(),
        cart_json: serde_json::to_string(&confirmation.line_items).unwrap_or_else(|_| "[]".into()),
        metadata_json: confirmation.metadata.to_string(),
        is_test: confirmation.sale_mode.is_test(),
    };

    match ledger::create_pending(&state.pool, &new).await {
        Ok(id) => Ok(id),
        // Lost a race against a concurrent delivery; the row exists now.
        Err(LedgerError::DuplicateOrder { .. }) => {
            let existing = ledger::find_by_order(
                &state.pool,
                confirmation.gateway,
                &confirmation.gateway_order_id,
            )
            .await
            .map_err(ledger_fault)?;
            existing.map(|t| t.id).ok_or_else(|| {
                AppError::InternalServerError("transaction vanished after duplicate".into())
            })
        }
        Err(e) => Err(ledger_fault(e)),
    }
}

fn ledger_fault(e: LedgerError) -> AppError {
    match e {
        LedgerError::Database(db) => AppError::DatabaseError(db),
        other => AppError::InternalServerError(other.to_string()),
    }
}
