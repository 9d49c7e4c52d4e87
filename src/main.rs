use anyhow::Result;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use coach_server::ai::OpenAiClient;
use coach_server::api;
use coach_server::config::Config;
use coach_server::db::init_database;
use coach_server::idgen::Snowflake;
use coach_server::state::AppState;
use coach_server::store::PgStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,coach_server=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration (reads .env if present)
    let config = Config::from_env()?;
    info!("Initialized configuration");

    // Initialize database
    let db = init_database(&config.database).await?;
    info!("Connected to database");

    let ids = match config.idgen.node {
        Some(node) => Snowflake::new(node),
        None => Snowflake::with_random_node(),
    };
    info!("Snowflake id generator on node {}", ids.node());

    let ai = OpenAiClient::new(&config.ai)?;

    let state = AppState::new(
        Arc::new(PgStore::new(db.pool().clone())),
        Arc::new(ids),
        Arc::new(ai),
    );

    // Handle shutdown signals
    let shutdown = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received, initiating graceful shutdown"),
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        }
    };

    api::start_api_server(state, &config.server, shutdown).await?;

    info!("Coach server shutdown complete");
    Ok(())
}
