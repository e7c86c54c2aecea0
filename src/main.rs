use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use dotenvy::dotenv;
use tokio::net::TcpListener;

use boxoffice_server::config::Config;
use boxoffice_server::notify::{self, TracingMailer};
use boxoffice_server::routes::create_routes;
use boxoffice_server::{init_pool, AppState};

#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = Arc::new(Config::from_env());

    let pool = init_pool(&config.database_url)
        .await
        .expect("Failed to open database");
    tracing::info!("Database ready, migrations applied");

    let state = AppState {
        pool: pool.clone(),
        config: config.clone(),
        mailer: Arc::new(TracingMailer),
    };

    // Fixed-interval notification sweep; the HTTP trigger runs the same code.
    let sweep_state = state.clone();
    tokio::spawn(async move {
        let mut ticker =
            tokio::time::interval(Duration::from_secs(sweep_state.config.sweep_interval_secs));
        loop {
            ticker.tick().await;
            match notify::sweep(
                &sweep_state.pool,
                sweep_state.mailer.as_ref(),
                &sweep_state.config.notify,
            )
            .await
            {
                Ok(report) if report.processed > 0 => {
                    tracing::info!(?report, "scheduled sweep completed");
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "scheduled sweep failed"),
            }
        }
    });

    let app: Router = create_routes(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Server running at http://{}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .expect("Failed to bind address");

    axum::serve(listener, app).await.expect("Server failed");
}
