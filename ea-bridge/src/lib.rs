//! ea-bridge: HTTP control plane for a trading agent connected over TCP.
//!
//! The agent dials in and speaks length-prefixed JSON. HTTP requests become
//! agent commands, correlated to their responses by request id.

mod health;
#[cfg(test)]
mod testing;

pub mod bridge;
pub mod config;
pub mod logging;
pub mod models;
pub mod service;
pub mod transport;

pub use bridge::{Bridge, BridgeConfig, BridgeError, CommandSender};
pub use config::{AppConfig, CommandTimeouts, ConfigError};
pub use health::HealthStatus;
pub use service::{CommandError, TradingService};
