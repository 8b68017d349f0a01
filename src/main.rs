use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use workforce_api::config;
use workforce_api::create_router;
use workforce_api::database::DatabaseManager;
use workforce_api::store::{MemoryStore, PgStore, Store};

#[derive(Parser)]
#[command(name = "workforce-api")]
#[command(about = "Permission-gated REST API for jobs, workers and materials")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Serve from the in-memory store even when DATABASE_URL is set
    #[arg(long)]
    memory: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = config::config();
    tracing::info!("Starting Workforce API in {:?} mode", config.environment);

    let pool = match (&config.database.url, args.memory) {
        (Some(_), false) => Some(DatabaseManager::connect(&config.database).await?),
        _ => None,
    };
    let store: Arc<dyn Store> = match &pool {
        Some(pool) => Arc::new(PgStore::new(pool.clone()).with_query_logging(config.database.enable_query_logging)),
        None => {
            tracing::warn!("No database configured; serving from the in-memory store");
            MemoryStore::new_shared()
        }
    };

    let app = create_router(store, config).context("invalid resource schema")?;

    let port = args.port.unwrap_or(config.api.port);
    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("Workforce API listening on http://{}", bind_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(pool) = pool {
        DatabaseManager::close(pool).await;
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
