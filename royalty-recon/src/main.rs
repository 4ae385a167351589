//! royalty-recon - Royalty report reconciliation service
//!
//! Accepts distributor sales reports, matches their tracks against the
//! release catalog and credits each owner's share to their balance.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use royalty_common::config::{load_or_default, RootFolderInitializer, RootFolderResolver};
use royalty_recon::AppState;

const MODULE_NAME: &str = "royalty-recon";

/// Command-line arguments for royalty-recon
#[derive(Parser, Debug)]
#[command(name = "royalty-recon")]
#[command(about = "Royalty report reconciliation service")]
#[command(version)]
struct Args {
    /// Root folder holding the database
    #[arg(short, long, env = "ROYALTY_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Explicit TOML configuration file
    #[arg(short, long, env = "ROYALTY_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on (overrides the TOML port)
    #[arg(short, long, env = "ROYALTY_RECON_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_or_default(args.config.as_deref(), MODULE_NAME);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("royalty_recon={0},royalty_common={0}", config.logging.level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting royalty-recon v{} ({}, {} build, built {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_PROFILE"),
        env!("BUILD_TIMESTAMP")
    );

    let root_folder = RootFolderResolver::new(args.root_folder, &config).resolve();
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to initialize root folder")?;

    let db_path = initializer.database_path();
    info!("Database: {}", db_path.display());

    let db_pool = royalty_recon::db::init_database_pool(&db_path)
        .await
        .context("Failed to open database")?;

    // Background tasks do not survive a restart
    let stale = royalty_recon::db::reports::fail_stale_reports(&db_pool).await?;
    if stale > 0 {
        warn!(count = stale, "Marked interrupted reports as failed");
    }

    let port = args.port.unwrap_or(config.port);
    let bind_address = format!("{}:{}", config.bind_address, port);

    let state = AppState::new(db_pool, Arc::new(config));
    let app = royalty_recon::build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;
    info!("Listening on http://{}", bind_address);
    info!("Health check: http://{}/health", bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
