mod auth;
mod cache;
mod config;
mod db;
mod error;
mod extractors;
mod feed;
mod media;
mod routes;
mod state;
mod stores;

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::auth::jwt::JwtKeys;
use crate::cache::Cache;
use crate::config::{Cli, Config};
use crate::media::MediaStore;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli);
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;

    // Initialize database
    let pool = db::create_pool(config.db_path())?;
    db::run_migrations(&pool)?;

    // Uploads directory + object store
    let media = MediaStore::new(config.uploads_path().clone())?;

    // Token keys: boot time is captured here, so a restart invalidates
    // every outstanding session.
    let jwt = Arc::new(JwtKeys::new(
        config.auth.jwt_secret.as_deref(),
        config.auth.token_hours,
    ));

    // Build app state
    let state = AppState {
        db: pool,
        config: config.clone(),
        cache: Cache::new(),
        media,
        jwt,
    };

    let app = routes::router()
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install shutdown handler: {}", e);
        return;
    }
    tracing::info!("Shutting down");
}
