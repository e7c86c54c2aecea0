//! On-demand trigger for the notification sweep, authenticated with the
//! internal shared secret. The same sweep also runs on a fixed interval from
//! the background task in `main`.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};

use crate::notify;
use crate::utils::error::AppError;
use crate::utils::response::success;
use crate::AppState;

pub const INTERNAL_SECRET_HEADER: &str = "x-internal-secret";

pub async fn trigger_sweep(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let presented = headers
        .get(INTERNAL_SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    // An unset secret disables the endpoint rather than opening it.
    if state.config.internal_api_secret.is_empty()
        || presented != state.config.internal_api_secret
    {
        return Err(AppError::Unauthorized("invalid internal secret".into()));
    }

    let report = notify::sweep(&state.pool, state.mailer.as_ref(), &state.config.notify)
        .await
        .map_err(|notify::NotifyError::Database(db)| AppError::DatabaseError(db))?;

    Ok(success(report, "Sweep completed").into_response())
}
