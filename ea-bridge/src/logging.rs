//! Tracing subscriber setup for the binary.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Directives used when RUST_LOG is not set, from an EABRIDGE_LOG level.
fn default_directives(level: Option<&str>) -> String {
    let level = match level {
        Some("trace") => "trace",
        Some("debug") => "debug",
        Some("warn") | Some("warning") => "warn",
        Some("error") => "error",
        _ => "info",
    };
    format!("ea_bridge={level},ea_bridge_wire={level}")
}

/// Install the global subscriber. Logs go to stderr; `LOG_FORMAT=json`
/// switches to JSON lines.
pub fn init_tracing() {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = std::env::var("EABRIDGE_LOG").ok();
        EnvFilter::new(default_directives(level.as_deref()))
    };

    let use_json = std::env::var("LOG_FORMAT").as_deref() == Ok("json");

    if use_json {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    } else {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_level_is_info() {
        assert_eq!(default_directives(None), "ea_bridge=info,ea_bridge_wire=info");
        assert_eq!(
            default_directives(Some("verbose")),
            "ea_bridge=info,ea_bridge_wire=info"
        );
    }

    #[test]
    fn level_applies_to_both_crates() {
        assert_eq!(
            default_directives(Some("debug")),
            "ea_bridge=debug,ea_bridge_wire=debug"
        );
        assert_eq!(
            default_directives(Some("warning")),
            "ea_bridge=warn,ea_bridge_wire=warn"
        );
    }
}
