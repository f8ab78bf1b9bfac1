//! HTTP server implementation.

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use crate::bridge::Bridge;
use crate::service::TradingService;

use super::routes::routes;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

/// Serve the HTTP API until SIGINT/SIGTERM, then stop the bridge so every
/// caller still waiting on the agent is released.
pub async fn serve(
    config: ServerConfig,
    service: Arc<TradingService>,
    bridge: Arc<Bridge>,
) -> anyhow::Result<()> {
    let app = routes(service);

    let addr = format!("{}:{}", config.host, config.port);

    let listener = TcpListener::bind(&addr).await?;
    let actual_addr = listener.local_addr()?;

    info!("Starting HTTP API on {}", actual_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");

    bridge.stop().await;

    Ok(())
}

/// Wait for SIGINT or SIGTERM.
///
/// # Panics
///
/// Panics if signal handlers cannot be installed. That only happens when the
/// tokio runtime is misconfigured, which should fail fast at startup.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler - is tokio runtime configured correctly?");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler - is tokio runtime configured correctly?")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT, shutting down...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down...");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8000);
    }
}
