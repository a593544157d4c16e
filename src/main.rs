use tracing::{error, info};

use ball_blast::config::RelayConfig;
use ball_blast::net::relay::RelayServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize logging (RUST_LOG, default info)
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!("Ball Blast relay v{}", env!("CARGO_PKG_VERSION"));

    let config = RelayConfig::load_or_default();
    info!(
        "Configuration loaded: {}:{}, max_matches={:?}",
        config.bind_address, config.port, config.max_matches
    );

    let server = RelayServer::bind(config).await?;
    let metrics = server.metrics();

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received");
    };

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Relay error: {}", e);
            }
        }
        _ = shutdown => {
            info!("Shutting down...");
        }
    }

    info!("Relay stopped: {}", metrics.snapshot());
    Ok(())
}
