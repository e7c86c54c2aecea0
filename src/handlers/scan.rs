//! Gate scan endpoint.
//!
//! Business rejections (limit reached, revoked, unknown token) are 200
//! responses with `valid: false`, so gate devices can distinguish "no entry"
//! from "the service is down".

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::scan::{self, ScanOutcome};
use crate::utils::error::AppError;
use crate::utils::response::success;
use crate::AppState;

#[derive(Deserialize)]
pub struct ScanRequest {
    pub token: String,
    #[serde(default)]
    pub validate_only: bool,
}

#[derive(Serialize)]
struct ScanResponse {
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    scan_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'static str>,
}

pub async fn scan_ticket(
    State(state): State<AppState>,
    Json(request): Json<ScanRequest>,
) -> Result<Response, AppError> {
    let outcome = scan::validate(&state.pool, &request.token, request.validate_only)
        .await
        .map_err(|scan::ScanError::Database(db)| AppError::DatabaseError(db))?;

    let response = match outcome {
        ScanOutcome::Admitted { scan_count } => ScanResponse {
            valid: true,
            scan_count: Some(scan_count),
            reason: None,
        },
        ScanOutcome::LimitExceeded { scan_count } => ScanResponse {
            valid: false,
            scan_count: Some(scan_count),
            reason: Some("scan_limit_exceeded"),
        },
        ScanOutcome::Revoked => ScanResponse {
            valid: false,
            scan_count: None,
            reason: Some("ticket_revoked"),
        },
        ScanOutcome::NotFound => ScanResponse {
            valid: false,
            scan_count: None,
            reason: Some("ticket_not_found"),
        },
    };

    let message = if request.validate_only {
        "Scan preview"
    } else {
        "Scan processed"
    };
    Ok(success(response, message).into_response())
}
