use std::net::SocketAddr;

use anyhow::Context;
use dotenvy::dotenv;
use schoolyard::router::init_router;
use schoolyard::state::init_app_state;
use schoolyard_config::{DatabaseConfig, ServerConfig};
use schoolyard_db::{MIGRATOR, init_db_pool};
use schoolyard_observability::{init_metrics, init_tracing, shutdown_tracer};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    init_tracing()?;

    let database = DatabaseConfig::from_env()?;
    let db = init_db_pool(&database)
        .await
        .context("Failed to connect to database")?;
    MIGRATOR.run(&db).await.context("Failed to run migrations")?;

    let metrics = init_metrics();
    let state = init_app_state(db, metrics);
    let app = init_router(state);

    let address = ServerConfig::from_env().bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;

    info!(address = %address, "Server running");
    info!("Swagger UI available at /swagger-ui, Scalar UI at /scalar");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    shutdown_tracer().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(%error, "Failed to listen for Ctrl+C");
    }
    info!("Shutdown signal received");
}
