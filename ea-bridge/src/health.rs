//! Health report for the HTTP control plane.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Always "running" while the API answers.
    pub server: String,
    pub ea_connected: bool,
    /// Unix seconds of the agent's last inbound frame.
    pub ea_last_seen: Option<f64>,
    /// Seconds since the service started.
    pub uptime: f64,
}

impl HealthStatus {
    pub fn new(connected: bool, last_seen: Option<DateTime<Utc>>, uptime_secs: f64) -> Self {
        Self {
            server: "running".to_string(),
            ea_connected: connected,
            ea_last_seen: last_seen.map(|t| t.timestamp_millis() as f64 / 1000.0),
            uptime: uptime_secs,
        }
    }
}
