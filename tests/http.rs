//! HTTP contract: status codes, auth, and response envelopes, exercised
//! against the assembled router.

mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use hmac::{Hmac, Mac};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sha2::Sha256;
use tower::ServiceExt;

use boxoffice_server::config::Config;
use boxoffice_server::models::TransactionStatus;
use boxoffice_server::notify::NotifyConfig;
use boxoffice_server::routes::create_routes;
use boxoffice_server::AppState;

use common::*;

const STRIPE_SECRET: &str = "whsec_stripe_test";
const PAYPAL_SECRET: &str = "whsec_paypal_test";
const INTERNAL_SECRET: &str = "internal_test_secret";

fn test_config() -> Config {
    Config {
        database_url: "sqlite::memory:".to_string(),
        port: 0,
        stripe_webhook_secret: STRIPE_SECRET.to_string(),
        paypal_webhook_secret: PAYPAL_SECRET.to_string(),
        internal_api_secret: INTERNAL_SECRET.to_string(),
        allowed_origins: vec!["http://localhost:3000".to_string()],
        enable_hsts: false,
        sweep_interval_secs: 60,
        notify: NotifyConfig::default(),
    }
}

async fn test_state() -> AppState {
    AppState {
        pool: test_pool().await,
        config: Arc::new(test_config()),
        mailer: Arc::new(ScriptedMailer::failing_first(0)),
    }
}

fn hex_hmac(secret: &str, message: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(message);
    hex::encode(mac.finalize().into_bytes())
}

fn stripe_signature(body: &[u8]) -> String {
    let ts = Utc::now().timestamp();
    let mut signed = ts.to_string().into_bytes();
    signed.push(b'.');
    signed.extend_from_slice(body);
    format!("t={ts},v1={}", hex_hmac(STRIPE_SECRET, &signed))
}

fn stripe_event(event_id: &str, order_id: &str, quantity: i64) -> Vec<u8> {
    json!({
        "id": event_id,
        "type": "checkout.session.completed",
        "data": { "object": {
            "id": order_id,
            "payment_intent": format!("pi_{order_id}"),
            "amount_total": 12500 * quantity,
            "currency": "usd",
            "customer_details": { "email": "ana@example.com", "name": "Ana Lopez" },
            "metadata": {},
            "line_items": { "data": [ {
                "quantity": quantity,
                "price": {
                    "unit_amount": 12500,
                    "product": { "metadata": {
                        "ticket_type": "weekend-pass",
                        "event_id": "boulderfest-2026"
                    }}
                }
            } ] }
        }}
    })
    .to_string()
    .into_bytes()
}

async fn post(
    state: &AppState,
    uri: &str,
    headers: &[(&str, &str)],
    body: Vec<u8>,
) -> (StatusCode, Value) {
    let mut request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    for (name, value) in headers {
        request = request.header(*name, *value);
    }
    let response = create_routes(state.clone())
        .oneshot(request.body(Body::from(body)).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn health_reports_ok() {
    let state = test_state().await;
    let response = create_routes(state)
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["data"]["status"], "ok");
}

#[tokio::test]
async fn webhook_without_signature_is_unauthorized() {
    let state = test_state().await;
    let (status, body) = post(&state, "/api/webhooks/stripe", &[], stripe_event("e1", "o1", 1)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "SIGNATURE_INVALID");
}

#[tokio::test]
async fn webhook_with_wrong_signature_is_unauthorized() {
    let state = test_state().await;
    let event = stripe_event("e2", "o2", 1);
    let ts = Utc::now().timestamp();
    let header = format!("t={ts},v1={}", hex_hmac("wrong_secret", &event));
    let (status, _) = post(
        &state,
        "/api/webhooks/stripe",
        &[("stripe-signature", &header)],
        event,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn webhook_with_invalid_json_is_bad_request() {
    let state = test_state().await;
    let body = b"not json at all".to_vec();
    let header = stripe_signature(&body);
    let (status, response) = post(
        &state,
        "/api/webhooks/stripe",
        &[("stripe-signature", &header)],
        body,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["error"]["code"], "MALFORMED_PAYLOAD");
}

#[tokio::test]
async fn stripe_webhook_fulfills_and_deduplicates() {
    let state = test_state().await;
    seed_ticket_type(&state.pool, "weekend-pass", Some(100), 0).await;

    let event = stripe_event("evt_http_1", "cs_http_1", 2);
    let header = stripe_signature(&event);

    let (status, body) = post(
        &state,
        "/api/webhooks/stripe",
        &[("stripe-signature", &header)],
        event.clone(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["accepted"], true);
    assert_eq!(body["data"]["ticket_ids"].as_array().unwrap().len(), 2);
    assert_eq!(sold_count(&state.pool, "weekend-pass").await, 2);

    // Redelivery: accepted=false, no new side effects.
    let (status, body) = post(
        &state,
        "/api/webhooks/stripe",
        &[("stripe-signature", &header)],
        event,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["accepted"], false);
    assert_eq!(sold_count(&state.pool, "weekend-pass").await, 2);

    // The confirmation email was queued exactly once.
    let queued: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM retry_queue")
        .fetch_one(&state.pool)
        .await
        .unwrap();
    assert_eq!(queued, 1);
}

#[tokio::test]
async fn uninteresting_event_types_are_acknowledged() {
    let state = test_state().await;
    let event = json!({ "id": "evt_ping", "type": "charge.updated", "data": { "object": {} } })
        .to_string()
        .into_bytes();
    let header = stripe_signature(&event);

    let (status, body) = post(
        &state,
        "/api/webhooks/stripe",
        &[("stripe-signature", &header)],
        event,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["accepted"], true);
    assert!(body["data"]["ticket_ids"].is_null());
}

#[tokio::test]
async fn sold_out_capacity_is_a_processing_fault() {
    let state = test_state().await;
    seed_ticket_type(&state.pool, "weekend-pass", Some(1), 1).await;

    let event = stripe_event("evt_http_2", "cs_http_2", 1);
    let header = stripe_signature(&event);
    let (status, _) = post(
        &state,
        "/api/webhooks/stripe",
        &[("stripe-signature", &header)],
        event,
    )
    .await;
    // Non-2xx so the gateway redelivers once an operator frees capacity.
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(sold_count(&state.pool, "weekend-pass").await, 1);
}

#[tokio::test]
async fn paypal_webhook_round_trip() {
    let state = test_state().await;
    seed_ticket_type(&state.pool, "day-pass", Some(10), 0).await;

    let event = json!({
        "id": "WH-http-1",
        "event_type": "PAYMENT.CAPTURE.COMPLETED",
        "resource": {
            "id": "CAP-http-1",
            "supplementary_data": { "related_ids": { "order_id": "ORD-http-1" } },
            "amount": { "value": "250.00", "currency_code": "USD" },
            "payer": { "email_address": "ben@example.com", "name": { "given_name": "Ben" } },
            "purchase_units": [ { "items": [ {
                "sku": "day-pass",
                "quantity": "2",
                "unit_amount": { "value": "125.00", "currency_code": "USD" },
                "category": "boulderfest-2026"
            } ] } ]
        }
    })
    .to_string()
    .into_bytes();

    // Wrong signature first.
    let (status, _) = post(
        &state,
        "/api/webhooks/paypal",
        &[("paypal-transmission-sig", "deadbeef")],
        event.clone(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let header = hex_hmac(PAYPAL_SECRET, &event);
    let (status, body) = post(
        &state,
        "/api/webhooks/paypal",
        &[("paypal-transmission-sig", &header)],
        event,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["accepted"], true);
    assert_eq!(body["data"]["ticket_ids"].as_array().unwrap().len(), 2);
    assert_eq!(sold_count(&state.pool, "day-pass").await, 2);
}

#[tokio::test]
async fn scan_endpoint_reports_business_rejections_with_200() {
    let state = test_state().await;

    let (status, body) = post(
        &state,
        "/api/tickets/scan",
        &[],
        json!({ "token": "TKT-unknown" }).to_string().into_bytes(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["valid"], false);
    assert_eq!(body["data"]["reason"], "ticket_not_found");

    let txn = pending_transaction(&state.pool, "ord_http_scan").await;
    seed_ticket(&state.pool, txn, "TKT-http", 1).await;

    let scan_body = json!({ "token": "TKT-http" }).to_string().into_bytes();
    let (status, body) = post(&state, "/api/tickets/scan", &[], scan_body.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["valid"], true);
    assert_eq!(body["data"]["scan_count"], 1);

    let (status, body) = post(&state, "/api/tickets/scan", &[], scan_body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["valid"], false);
    assert_eq!(body["data"]["reason"], "scan_limit_exceeded");
}

#[tokio::test]
async fn sweep_trigger_requires_the_internal_secret() {
    let state = test_state().await;

    let (status, _) = post(&state, "/api/notifications/sweep", &[], Vec::new()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = post(
        &state,
        "/api/notifications/sweep",
        &[("x-internal-secret", "wrong")],
        Vec::new(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = post(
        &state,
        "/api/notifications/sweep",
        &[("x-internal-secret", INTERNAL_SECRET)],
        Vec::new(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["processed"], 0);
}

#[tokio::test]
async fn fulfillment_completes_the_ledger_row() {
    let state = test_state().await;
    seed_ticket_type(&state.pool, "weekend-pass", Some(100), 0).await;

    let event = stripe_event("evt_http_3", "cs_http_3", 1);
    let header = stripe_signature(&event);
    let (status, _) = post(
        &state,
        "/api/webhooks/stripe",
        &[("stripe-signature", &header)],
        event,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let transaction = boxoffice_server::ledger::find_by_order(
        &state.pool,
        boxoffice_server::models::Gateway::Stripe,
        "cs_http_3",
    )
    .await
    .unwrap()
    .expect("ledger row created from confirmation");
    assert_eq!(transaction.status, TransactionStatus::Completed);
    assert_eq!(transaction.gateway_capture_id.as_deref(), Some("pi_cs_http_3"));
    assert_eq!(transaction.amount_cents, 12500);
}
