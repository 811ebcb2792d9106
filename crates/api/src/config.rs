//! Gateway configuration loaded from environment variables.

use std::time::Duration;

use fabric::Endpoints;

/// Gateway configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `8000`)
/// - `CALL_TIMEOUT_MS` — how long to wait for a service reply (default: `5000`)
/// - `SERVICE_HOST`, `<SERVICE>_HOST` — where the services listen
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub call_timeout: Duration,
    pub endpoints: Endpoints,
    pub log_level: String,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("HOST").unwrap_or(defaults.host),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            call_timeout: std::env::var("CALL_TIMEOUT_MS")
                .ok()
                .and_then(|ms| ms.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.call_timeout),
            endpoints: Endpoints::from_env(),
            log_level: std::env::var("RUST_LOG").unwrap_or(defaults.log_level),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            call_timeout: Duration::from_secs(5),
            endpoints: Endpoints::default(),
            log_level: "info".to_string(),
        }
    }
}
