// ============================
// pointing-backend-bin/src/main.rs
// ============================
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use pointing_backend_lib::{config::Settings, ws_router, AppState};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Planning-poker room synchronization server
#[derive(Parser, Debug)]
#[command(name = "pointing-server", version)]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, default_value = "config.toml")]
    config: String,

    /// Override the configured bind address
    #[arg(long)]
    bind: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load_from(&cli.config)?;
    if let Some(bind) = cli.bind {
        settings.bind_addr = bind;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(settings.log_level.clone())),
        )
        .init();

    let addr = settings.bind_addr;
    let state = Arc::new(AppState::new_default(settings));
    let app = ws_router::create_router(state);

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "listening");

    axum::serve(listener, app).await?;

    Ok(())
}
