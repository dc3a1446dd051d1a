use std::net::SocketAddr;
use std::sync::Arc;

use aggregator::admission::InFlightSet;
use aggregator::config::AppConfig;
use aggregator::database::init_db;
use aggregator::state::AppState;
use tracing::{Level, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let config = AppConfig::load()?;
    let db = init_db(&config.database).await?;

    info!(
        max_wait_ms = config.aggregation.max_wait_ms,
        timeout_ms = config.aggregation.timeout_ms,
        "Database ready"
    );

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;

    let state = AppState {
        db,
        config,
        admission: Arc::new(InFlightSet::new()),
    };

    let app = aggregator::build_router(state);

    info!("Server running at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
