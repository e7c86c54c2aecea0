pub mod audit;
pub mod config;
pub mod gateway;
pub mod handlers;
pub mod intake;
pub mod issuance;
pub mod ledger;
pub mod models;
pub mod notify;
pub mod routes;
pub mod scan;
pub mod utils;

use std::str::FromStr;
use std::sync::Arc;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use config::Config;
use notify::Mailer;

/// Everything a handler needs, constructed once in the process entry point
/// and injected through axum state. No module-level singletons.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Arc<Config>,
    pub mailer: Arc<dyn Mailer>,
}

/// Opens the database and applies migrations. The schema's uniqueness and
/// check constraints are part of the service contract, so a store without
/// them is not usable.
pub async fn init_pool(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    sqlx::migrate!().run(&pool).await?;
    Ok(pool)
}
