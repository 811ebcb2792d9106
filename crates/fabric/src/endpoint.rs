//! Where each service listens.

use std::collections::HashMap;
use std::env;

use common::ServiceName;

/// Addresses of one service's endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoints {
    pub command: String,
    pub publish: Option<String>,
    pub peer: Option<String>,
}

impl ServiceEndpoints {
    /// Well-known ports of `service` on `host`.
    pub fn well_known(service: ServiceName, host: &str) -> Self {
        Self {
            command: format!("{host}:{}", service.command_port()),
            publish: service.publish_port().map(|port| format!("{host}:{port}")),
            peer: service.peer_port().map(|port| format!("{host}:{port}")),
        }
    }

    /// Port 0 for every endpoint `service` owns, so the OS picks free ports.
    pub fn ephemeral(service: ServiceName, host: &str) -> Self {
        Self {
            command: format!("{host}:0"),
            publish: service.publish_port().map(|_| format!("{host}:0")),
            peer: service.peer_port().map(|_| format!("{host}:0")),
        }
    }
}

/// Endpoint directory for every service.
///
/// Defaults to the well-known ports on localhost. Hosts can be overridden
/// per service through `<SERVICE>_HOST` (e.g. `PRICING_HOST=pricing`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    services: HashMap<ServiceName, ServiceEndpoints>,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::on_host("127.0.0.1")
    }
}

impl Endpoints {
    /// Well-known ports of every service on a single host.
    pub fn on_host(host: &str) -> Self {
        let services = ServiceName::ALL
            .into_iter()
            .map(|service| (service, ServiceEndpoints::well_known(service, host)))
            .collect();
        Self { services }
    }

    pub fn from_env() -> Self {
        let default_host = env::var("SERVICE_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let services = ServiceName::ALL
            .into_iter()
            .map(|service| {
                let var = format!("{}_HOST", service.as_str().to_uppercase());
                let host = env::var(var).unwrap_or_else(|_| default_host.clone());
                (service, ServiceEndpoints::well_known(service, &host))
            })
            .collect();
        Self { services }
    }

    /// Replaces the endpoints of one service.
    pub fn with(mut self, service: ServiceName, endpoints: ServiceEndpoints) -> Self {
        self.services.insert(service, endpoints);
        self
    }

    pub fn set(&mut self, service: ServiceName, endpoints: ServiceEndpoints) {
        self.services.insert(service, endpoints);
    }

    pub fn get(&self, service: ServiceName) -> ServiceEndpoints {
        self.services
            .get(&service)
            .cloned()
            .unwrap_or_else(|| ServiceEndpoints::well_known(service, "127.0.0.1"))
    }

    pub fn command(&self, service: ServiceName) -> String {
        self.get(service).command
    }

    pub fn publish(&self, service: ServiceName) -> Option<String> {
        self.get(service).publish
    }

    pub fn peer(&self, service: ServiceName) -> Option<String> {
        self.get(service).peer
    }
}
