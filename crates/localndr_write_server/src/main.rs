//! Write-back server binary.

use localndr_write_server::{app_router, demo_events, AppState, ServerConfig, WriteServer};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("localndr_write_server=info".parse().expect("valid directive")),
        )
        .init();

    let config = ServerConfig::from_env()?;

    let server = match &config.database_path {
        Some(path) => WriteServer::open(path)?,
        None => WriteServer::open_in_memory()?,
    };
    if config.seed_events > 0 && server.event_count()? == 0 {
        let seeded = server.insert_events(&demo_events(config.seed_events, chrono::Utc::now()))?;
        tracing::info!(seeded, "seeded demo events");
    }

    let router = app_router(AppState {
        server: Arc::new(server),
    });
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("write server listening on {}", config.bind_addr);
    axum::serve(listener, router).await?;
    Ok(())
}
