use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use rtype_server::config::ServerConfig;
use rtype_server::server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    info!("R-Type Server v{}", env!("CARGO_PKG_VERSION"));

    let config = ServerConfig::load_or_default();
    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        anyhow::bail!(e);
    }
    info!(
        "Configuration loaded: {}:{}, {} Hz, max_lobbies={}, {} players per lobby",
        config.bind_address,
        config.port,
        config.tick_rate,
        config.max_lobbies,
        config.max_players_per_lobby
    );

    let handle = server::start(config).await?;
    info!("Server ready on {}", handle.local_addr());

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    handle.shutdown().await;
    info!("Server stopped");

    Ok(())
}
