//! wlib-api - Wheel library backend service
//!
//! Single HTTP entry point for the community wheel lending library:
//! form submissions (signup, add wheel, checkout, review) on POST,
//! review retrieval on GET, plus maintenance endpoints for intake
//! reconciliation and member deactivation.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use wlib_api::{build_router, AppState};
use wlib_common::config::{self, ConfigOverrides};
use wlib_common::db::init_database;
use wlib_common::store::SqliteStore;

#[derive(Debug, Parser)]
#[command(name = "wlib-api", about = "Wheel library backend service")]
struct Args {
    /// Listen address, e.g. 127.0.0.1:5780
    #[arg(long)]
    bind: Option<String>,

    /// Path to the SQLite database file
    #[arg(long)]
    database: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber before anything else
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Build identification immediately after tracing init
    info!(
        "Starting wlib-api v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();
    let config = config::resolve(&ConfigOverrides {
        bind: args.bind,
        database_path: args.database,
    })?;

    info!("Database path: {}", config.database_path.display());
    let pool = init_database(&config.database_path).await?;
    let store = Arc::new(SqliteStore::new(pool));

    let bind = config.bind.clone();
    let state = AppState::new(store, config);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    info!("wlib-api listening on http://{}", bind);
    info!("Health check: http://{}/health", bind);

    axum::serve(listener, app).await?;

    Ok(())
}
