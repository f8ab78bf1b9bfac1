use std::sync::Arc;

use ea_bridge::transport::serve;
use ea_bridge::{AppConfig, Bridge, TradingService, logging};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_tracing();

    let config = AppConfig::from_env()?;
    tracing::info!(
        bridge_port = config.bridge.port,
        api_port = config.server.port,
        command_timeout_secs = config.timeouts.default.as_secs(),
        "Starting ea-bridge"
    );

    let bridge = Bridge::new(config.bridge.clone());
    bridge.start().await?;

    let service = Arc::new(TradingService::new(bridge.clone(), config.timeouts));

    if let Err(e) = serve(config.server, service, bridge.clone()).await {
        tracing::error!(error = %e, "HTTP server failed");
        bridge.stop().await;
        return Err(e);
    }

    Ok(())
}
