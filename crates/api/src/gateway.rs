//! Command pools behind the HTTP routes.

use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

use axum::http::StatusCode;
use common::ServiceName;
use fabric::{CommandPool, Endpoints};
use serde_json::{Map, Value};

use crate::error::ApiError;

/// One pool of command connections per service.
///
/// Every HTTP request becomes exactly one command call; concurrent requests
/// to the same service use separate connections from its pool.
#[derive(Debug)]
pub struct Gateway {
    pools: HashMap<ServiceName, CommandPool>,
}

impl Gateway {
    pub fn new(endpoints: &Endpoints, call_timeout: Duration) -> Self {
        let pools = ServiceName::ALL
            .into_iter()
            .map(|service| (service, CommandPool::new(endpoints.command(service), call_timeout)))
            .collect();
        Self { pools }
    }

    /// Command endpoint of every service, by service name.
    pub fn command_endpoints(&self) -> BTreeMap<&'static str, String> {
        self.pools
            .iter()
            .map(|(service, pool)| (service.as_str(), pool.endpoint().to_string()))
            .collect()
    }

    /// Sends `action` to `service` and returns the reply data.
    ///
    /// A domain rejection is reported with the `rejected` status.
    #[tracing::instrument(skip(self, data, rejected))]
    pub async fn call(
        &self,
        service: ServiceName,
        action: &'static str,
        data: Map<String, Value>,
        rejected: StatusCode,
    ) -> Result<Value, ApiError> {
        let pool = self
            .pools
            .get(&service)
            .ok_or_else(|| ApiError::Unavailable(format!("no endpoint configured for {service}")))?;

        let start = Instant::now();
        let result = pool.request(action, data).await;
        let outcome = match &result {
            Ok(_) => "success",
            Err(fabric::CallError::Rejected(_)) => "rejected",
            Err(fabric::CallError::Transport(_)) => "transport_error",
        };
        metrics::counter!("gateway_calls_total", "service" => service.as_str(), "action" => action, "outcome" => outcome)
            .increment(1);
        metrics::histogram!("gateway_call_duration_seconds", "service" => service.as_str())
            .record(start.elapsed().as_secs_f64());

        result.map_err(|e| {
            tracing::debug!(action, error = %e, "command call failed");
            ApiError::from_call(e, rejected)
        })
    }
}
