use std::env;

use chrono::Duration;

use crate::notify::NotifyConfig;

pub mod cors;
pub mod headers;

pub use cors::create_cors_layer;
pub use headers::SecurityHeadersLayer;

/// Process configuration, read from the environment exactly once in `main`
/// and passed into everything that needs it. No module reads env vars on its
/// own.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub stripe_webhook_secret: String,
    pub paypal_webhook_secret: String,
    /// Shared secret for internally-authenticated calls (sweep trigger).
    pub internal_api_secret: String,
    pub allowed_origins: Vec<String>,
    pub enable_hsts: bool,
    pub sweep_interval_secs: u64,
    pub notify: NotifyConfig,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:boxoffice.db".to_string()),
            port: parse_env("PORT", 3001),
            stripe_webhook_secret: env::var("STRIPE_WEBHOOK_SECRET").unwrap_or_default(),
            paypal_webhook_secret: env::var("PAYPAL_WEBHOOK_SECRET").unwrap_or_default(),
            internal_api_secret: env::var("INTERNAL_API_SECRET").unwrap_or_default(),
            allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:3000,http://localhost:5173".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            enable_hsts: env::var("RUST_ENV")
                .map(|v| v.to_lowercase() == "production")
                .unwrap_or(false),
            sweep_interval_secs: parse_env("NOTIFY_SWEEP_INTERVAL_SECS", 60),
            notify: NotifyConfig {
                backoff_base: Duration::seconds(parse_env("NOTIFY_BACKOFF_BASE_SECS", 60)),
                backoff_cap: Duration::seconds(parse_env("NOTIFY_BACKOFF_CAP_SECS", 21_600)),
                max_attempts: parse_env("NOTIFY_MAX_ATTEMPTS", 5),
                batch_size: parse_env("NOTIFY_BATCH_SIZE", 25),
                attempt_timeout: std::time::Duration::from_secs(parse_env(
                    "NOTIFY_ATTEMPT_TIMEOUT_SECS",
                    10,
                )),
            },
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
