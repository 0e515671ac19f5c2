//! Tracing subscriber setup for hosts that do not install their own.

use tracing_subscriber::EnvFilter;

use crate::config::env_vars;
use crate::error::{Error, Result};

const DEFAULT_FILTER: &str = "victron_mqtt=info";

/// Install a global `tracing` subscriber.
///
/// `RUST_LOG` controls the filter (default `victron_mqtt=info`). Setting
/// `VICTRON_MQTT_LOG_JSON=true` switches to JSON output. Fails if a global
/// subscriber is already installed.
pub fn init_tracing() -> Result<()> {
    let json_logging = std::env::var(env_vars::LOG_JSON)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(false);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let result = if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .compact()
            .try_init()
    };

    result.map_err(|e| Error::Logging(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_fails() {
        // the first call may race with other tests; the second never succeeds
        let _ = init_tracing();
        assert!(matches!(init_tracing(), Err(Error::Logging(_))));
    }
}
