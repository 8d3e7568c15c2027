//! Main executable entry point for the antgrid server.
//!
//! This binary initializes logging, loads and validates configuration, then
//! serves the game over WebSocket until Ctrl+C.

use antgrid_config::{load_config, Config};
use antgrid_simulation::{EngineSettings, GameEngine};
use antgrid_transport::{Hub, HubSettings, RateLimitConfig, ServerOptions, WebSocketServer};
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a JSON or TOML configuration file; built-in defaults if omitted
    #[arg(short, long, env = "ANTGRID_CONFIG")]
    config: Option<PathBuf>,

    /// Overrides `server.host`
    #[arg(long)]
    host: Option<String>,

    /// Overrides `server.port`
    #[arg(long)]
    port: Option<u16>,
}

fn engine_settings(config: &Config) -> Result<EngineSettings, Box<dyn std::error::Error>> {
    Ok(EngineSettings {
        grid_width: u32::try_from(config.grid_width)?,
        grid_height: u32::try_from(config.grid_height)?,
        tick_interval: config.tick_interval(),
        max_participants: config.max_players,
    })
}

fn hub_settings(config: &Config) -> HubSettings {
    HubSettings {
        rate_limit: RateLimitConfig {
            window: config.rate_limit_window(),
            max_messages: config.max_messages_per_window,
        },
        chunk_size: config.grid_chunk_size,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // RUST_LOG directives are honoured; antgrid crates log at info otherwise.
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("antgrid=info".parse()?))
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            load_config(path)?
        }
        None => {
            info!("No configuration file given, using defaults");
            Config::default()
        }
    };
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    config.validate()?;

    info!(
        width = config.grid_width,
        height = config.grid_height,
        tick_interval_ms = config.tick_interval_ms,
        max_players = config.max_players,
        "Configuration loaded"
    );

    let engine = GameEngine::new(engine_settings(&config)?);
    let hub = Hub::new(engine, hub_settings(&config));
    let options = ServerOptions {
        allowed_origins: config.server.allowed_origins.clone(),
        heartbeat_interval: config.heartbeat_interval(),
    };

    let server = WebSocketServer::bind(&config.server.bind_address(), hub, options).await?;
    server
        .serve(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Ctrl+C received, shutting down");
        })
        .await?;

    info!("Server stopped");
    Ok(())
}
