use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use miniblog_content::ContentStore;
use miniblog_core::MiniblogConfig;
use miniblog_live::LiveHub;
use tracing::{info, warn};

mod app;
mod http;
mod ws;

#[derive(Parser)]
#[command(name = "miniblog-gateway", version, about = "Miniblog HTTP API and live-update server")]
struct Cli {
    /// Path to miniblog.toml
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "miniblog_gateway=info,miniblog_live=info,tower_http=debug".into()
            }),
        )
        .init();

    // load config: --config > MINIBLOG_CONFIG env > ~/.miniblog/miniblog.toml
    let cli = Cli::parse();
    let config_path = cli.config.or_else(|| std::env::var("MINIBLOG_CONFIG").ok());
    let config = MiniblogConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!(code = e.code(), "Config load failed ({}), using defaults", e);
        MiniblogConfig::default()
    });

    let db_path = &config.database.path;
    config.ensure_database_dir()?;
    info!(path = %db_path, "opening SQLite database");

    let db = rusqlite::Connection::open(db_path)?;
    db.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    miniblog_content::db::init_db(&db)?;
    info!("database migrations complete");

    let store = ContentStore::new(db);
    let live = LiveHub::in_memory(config.live.clone());
    info!(group = %config.live.group, "live updates on in-memory group backend");

    let addr: SocketAddr = format!("{}:{}", config.gateway.bind, config.gateway.port).parse()?;
    let state = Arc::new(app::AppState::new(config, store, live));
    let router = app::build_router(Arc::clone(&state));

    info!("Miniblog gateway listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(Arc::clone(&state)))
        .await?;

    info!("Miniblog gateway stopped");
    Ok(())
}

/// Resolves on Ctrl-C once every live session has closed or the grace
/// period has run out.
async fn shutdown_signal(state: Arc<app::AppState>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "could not listen for Ctrl-C; running until killed");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
    let grace = Duration::from_millis(state.config.live.shutdown_grace_ms);
    state.live.shutdown(grace).await;
}
