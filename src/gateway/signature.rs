//! Webhook signature verification.
//!
//! Both gateways sign the raw request body with a shared secret. Stripe-style
//! signatures carry a timestamp and are rejected outside a replay window;
//! PayPal-style signatures are a bare HMAC of the body. Verification happens
//! before any state change.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Maximum age of a Stripe-style signed timestamp.
pub const REPLAY_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("missing signature header")]
    MissingHeader,
    #[error("malformed signature header")]
    Malformed,
    #[error("signature timestamp outside replay window")]
    Expired,
    #[error("signature mismatch")]
    Mismatch,
}

/// Verifies a `stripe-signature` header of the form `t=<unix>,v1=<hex>`,
/// where the HMAC is computed over `"<unix>.<body>"`.
pub fn verify_stripe(
    secret: &str,
    header: &str,
    body: &[u8],
    now: DateTime<Utc>,
) -> Result<(), SignatureError> {
    let mut timestamp: Option<i64> = None;
    let mut candidates: Vec<&str> = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse().ok(),
            Some(("v1", value)) => candidates.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::Malformed)?;
    if candidates.is_empty() {
        return Err(SignatureError::Malformed);
    }
    if (now.timestamp() - timestamp).abs() > REPLAY_TOLERANCE_SECS {
        return Err(SignatureError::Expired);
    }

    let mut signed_payload = timestamp.to_string().into_bytes();
    signed_payload.push(b'.');
    signed_payload.extend_from_slice(body);

    for candidate in candidates {
        if verify_hex_hmac(secret, &signed_payload, candidate) {
            return Ok(());
        }
    }
    Err(SignatureError::Mismatch)
}

/// Verifies a `paypal-transmission-sig` header: hex HMAC-SHA256 of the raw
/// body under the shared webhook secret.
pub fn verify_paypal(secret: &str, header: &str, body: &[u8]) -> Result<(), SignatureError> {
    if header.trim().is_empty() {
        return Err(SignatureError::MissingHeader);
    }
    if verify_hex_hmac(secret, body, header.trim()) {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

fn verify_hex_hmac(secret: &str, message: &[u8], candidate_hex: &str) -> bool {
    let Ok(candidate) = hex::decode(candidate_hex) else {
        return false;
    };
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(message);
    // Constant-time comparison via the MAC itself.
    mac.verify_slice(&candidate).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test123secret456";

    fn sign(secret: &str, message: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(message);
        hex::encode(mac.finalize().into_bytes())
    }

    fn stripe_header(secret: &str, body: &[u8], at: DateTime<Utc>) -> String {
        let ts = at.timestamp();
        let sig = sign(secret, format!("{ts}.{}", String::from_utf8_lossy(body)).as_bytes());
        format!("t={ts},v1={sig}")
    }

    #[test]
    fn stripe_valid_signature_accepted() {
        let body = br#"{"type":"checkout.session.completed"}"#;
        let now = Utc::now();
        let header = stripe_header(SECRET, body, now);
        assert!(verify_stripe(SECRET, &header, body, now).is_ok());
    }

    #[test]
    fn stripe_wrong_secret_rejected() {
        let body = br#"{"type":"checkout.session.completed"}"#;
        let now = Utc::now();
        let header = stripe_header("wrong_secret", body, now);
        assert_eq!(
            verify_stripe(SECRET, &header, body, now),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn stripe_modified_body_rejected() {
        let now = Utc::now();
        let header = stripe_header(SECRET, b"{\"a\":1}", now);
        assert_eq!(
            verify_stripe(SECRET, &header, b"{\"a\":2}", now),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn stripe_stale_timestamp_rejected() {
        let body = b"{}";
        let signed_at = Utc::now() - chrono::Duration::seconds(600);
        let header = stripe_header(SECRET, body, signed_at);
        assert_eq!(
            verify_stripe(SECRET, &header, body, Utc::now()),
            Err(SignatureError::Expired)
        );
    }

    #[test]
    fn stripe_header_without_timestamp_is_malformed() {
        assert_eq!(
            verify_stripe(SECRET, "v1=deadbeef", b"{}", Utc::now()),
            Err(SignatureError::Malformed)
        );
    }

    #[test]
    fn paypal_valid_signature_accepted() {
        let body = br#"{"event_type":"PAYMENT.CAPTURE.COMPLETED"}"#;
        let header = sign(SECRET, body);
        assert!(verify_paypal(SECRET, &header, body).is_ok());
    }

    #[test]
    fn paypal_bad_hex_rejected() {
        assert_eq!(
            verify_paypal(SECRET, "not-hex", b"{}"),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn paypal_empty_header_is_missing() {
        assert_eq!(
            verify_paypal(SECRET, "  ", b"{}"),
            Err(SignatureError::MissingHeader)
        );
    }
}
