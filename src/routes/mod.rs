use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::config::{create_cors_layer, SecurityHeadersLayer};
use crate::handlers::{health_check, notifications, scan, webhooks};
use crate::AppState;

pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/webhooks/stripe", post(webhooks::stripe_webhook))
        .route("/api/webhooks/paypal", post(webhooks::paypal_webhook))
        .route("/api/tickets/scan", post(scan::scan_ticket))
        .route("/api/notifications/sweep", post(notifications::trigger_sweep))
        .layer(SecurityHeadersLayer::new(state.config.enable_hsts))
        .layer(create_cors_layer(&state.config.allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
