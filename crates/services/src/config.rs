//! Node configuration loaded from environment variables.

use std::time::Duration;

use common::ServiceName;
use fabric::{Endpoints, ServiceEndpoints};

use crate::{Result, ServiceError};

const DEFAULT_CALL_TIMEOUT_MS: u64 = 2_000;

/// Configuration of one service node.
///
/// Reads from environment variables:
/// - `SERVICE` — which service to run (or the first command-line argument)
/// - `BIND_HOST` — interface the node's own endpoints bind on (default: `"0.0.0.0"`)
/// - `CALL_TIMEOUT_MS` — peer request timeout (default: `2000`)
/// - `SERVICE_HOST`, `<SERVICE>_HOST` — where the other services are reached
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub service: ServiceName,
    pub bind_host: String,
    pub call_timeout: Duration,
    pub endpoints: Endpoints,
}

impl NodeConfig {
    /// Defaults for `service`, reaching every other service on localhost.
    pub fn new(service: ServiceName) -> Self {
        Self {
            service,
            bind_host: "0.0.0.0".to_string(),
            call_timeout: Duration::from_millis(DEFAULT_CALL_TIMEOUT_MS),
            endpoints: Endpoints::default(),
        }
    }

    pub fn from_env() -> Result<Self> {
        let raw = std::env::var("SERVICE")
            .ok()
            .or_else(|| std::env::args().nth(1))
            .ok_or_else(|| ServiceError::Config("SERVICE is not set".to_string()))?;
        let service: ServiceName = raw.parse().map_err(|e| ServiceError::Config(format!("{e}")))?;

        let call_timeout = std::env::var("CALL_TIMEOUT_MS")
            .ok()
            .and_then(|ms| ms.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_millis(DEFAULT_CALL_TIMEOUT_MS));

        Ok(Self {
            service,
            bind_host: std::env::var("BIND_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            call_timeout,
            endpoints: Endpoints::from_env(),
        })
    }

    /// The node's own endpoints: the well-known ports on `bind_host`.
    pub fn bind_endpoints(&self) -> ServiceEndpoints {
        ServiceEndpoints::well_known(self.service, &self.bind_host)
    }
}
