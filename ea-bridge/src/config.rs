//! Runtime configuration, read from environment variables.

use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use crate::bridge::BridgeConfig;
use crate::transport::ServerConfig;

pub const BRIDGE_HOST: &str = "BRIDGE_HOST";
pub const BRIDGE_PORT: &str = "BRIDGE_PORT";
pub const API_HOST: &str = "API_HOST";
pub const API_PORT: &str = "API_PORT";
pub const COMMAND_TIMEOUT_SECS: &str = "COMMAND_TIMEOUT_SECS";
pub const EXTENDED_COMMAND_TIMEOUT_SECS: &str = "EXTENDED_COMMAND_TIMEOUT_SECS";

/// Longest command timeout accepted from the environment (one day).
pub const MAX_TIMEOUT_SECS: u64 = 86_400;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {var}={value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// How long the HTTP layer waits for the agent per command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandTimeouts {
    pub default: Duration,
    /// Used for slow queries (deal history, symbol list).
    pub extended: Duration,
}

impl Default for CommandTimeouts {
    fn default() -> Self {
        Self {
            default: Duration::from_secs(10),
            extended: Duration::from_secs(15),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub bridge: BridgeConfig,
    pub server: ServerConfig,
    pub timeouts: CommandTimeouts,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build the config from an arbitrary variable source. Unset or blank
    /// variables fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let lookup = |var: &str| {
            lookup(var)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let bridge = BridgeConfig {
            host: lookup(BRIDGE_HOST).unwrap_or(defaults.bridge.host),
            port: parse_var(&lookup, BRIDGE_PORT, defaults.bridge.port)?,
        };
        let server = ServerConfig {
            host: lookup(API_HOST).unwrap_or(defaults.server.host),
            port: parse_var(&lookup, API_PORT, defaults.server.port)?,
        };
        let timeouts = CommandTimeouts {
            default: parse_timeout(&lookup, COMMAND_TIMEOUT_SECS, defaults.timeouts.default)?,
            extended: parse_timeout(
                &lookup,
                EXTENDED_COMMAND_TIMEOUT_SECS,
                defaults.timeouts.extended,
            )?,
        };

        Ok(Self {
            bridge,
            server,
            timeouts,
        })
    }
}

fn parse_var<T, F>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
            value,
        }),
    }
}

fn parse_timeout<F>(lookup: &F, var: &'static str, default: Duration) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let secs = parse_var(lookup, var, default.as_secs())?;
    if !(1..=MAX_TIMEOUT_SECS).contains(&secs) {
        return Err(ConfigError::Invalid {
            var,
            value: secs.to_string(),
            reason: format!("timeout must be between 1 and {MAX_TIMEOUT_SECS} seconds"),
        });
    }
    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|var| vars.get(var).cloned())
    }

    #[test]
    fn defaults_when_nothing_set() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.bridge.host, "0.0.0.0");
        assert_eq!(config.bridge.port, 15555);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.timeouts, CommandTimeouts::default());
        assert_eq!(config.timeouts.default, Duration::from_secs(10));
        assert_eq!(config.timeouts.extended, Duration::from_secs(15));
    }

    #[test]
    fn overrides_are_applied() {
        let config = config_from(&[
            (BRIDGE_HOST, "127.0.0.1"),
            (BRIDGE_PORT, "16000"),
            (API_HOST, "localhost"),
            (API_PORT, " 9000 "),
            (COMMAND_TIMEOUT_SECS, "3"),
            (EXTENDED_COMMAND_TIMEOUT_SECS, "30"),
        ])
        .unwrap();
        assert_eq!(config.bridge.host, "127.0.0.1");
        assert_eq!(config.bridge.port, 16000);
        assert_eq!(config.server.host, "localhost");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.timeouts.default, Duration::from_secs(3));
        assert_eq!(config.timeouts.extended, Duration::from_secs(30));
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config = config_from(&[(BRIDGE_PORT, ""), (API_HOST, "   ")]).unwrap();
        assert_eq!(config.bridge.port, 15555);
        assert_eq!(config.server.host, "0.0.0.0");
    }

    #[test]
    fn invalid_port_is_rejected() {
        let err = config_from(&[(BRIDGE_PORT, "70000")]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid { var: BRIDGE_PORT, ref value, .. } if value == "70000"
        ));
        assert!(err.to_string().starts_with("invalid BRIDGE_PORT=\"70000\""));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = config_from(&[(COMMAND_TIMEOUT_SECS, "0")]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                var: COMMAND_TIMEOUT_SECS,
                ..
            }
        ));
    }

    #[test]
    fn oversized_timeout_is_rejected() {
        let err = config_from(&[(COMMAND_TIMEOUT_SECS, "18446744073709551615")]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                var: COMMAND_TIMEOUT_SECS,
                ..
            }
        ));

        assert!(config_from(&[(EXTENDED_COMMAND_TIMEOUT_SECS, "86401")]).is_err());

        let config = config_from(&[(EXTENDED_COMMAND_TIMEOUT_SECS, "86400")]).unwrap();
        assert_eq!(config.timeouts.extended, Duration::from_secs(MAX_TIMEOUT_SECS));
    }

    #[test]
    fn non_numeric_timeout_is_rejected() {
        assert!(config_from(&[(EXTENDED_COMMAND_TIMEOUT_SECS, "soon")]).is_err());
    }
}
