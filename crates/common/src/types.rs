use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a record owned by one of the services.
///
/// Wraps a UUID so record ids cannot be mixed up with other UUID-based
/// values. On the wire it is the plain hyphenated UUID string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(Uuid);

impl RecordId {
    /// Creates a new random record ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a record ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Parses a record ID, returning `None` for anything that is not a UUID.
    ///
    /// Callers looking up a record treat an unparseable id the same as an
    /// unknown one.
    pub fn parse(raw: &str) -> Option<Self> {
        raw.trim().parse().ok()
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RecordId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl From<Uuid> for RecordId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<RecordId> for Uuid {
    fn from(id: RecordId) -> Self {
        id.0
    }
}

/// The independently-owned services of the system.
///
/// Each service has one well-known command endpoint. Producers additionally
/// own a publish endpoint, and services answering peer queries own one peer
/// endpoint per relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceName {
    Product,
    Customer,
    Inventory,
    Pricing,
    Order,
}

impl ServiceName {
    /// All services, in start-up order.
    pub const ALL: [ServiceName; 5] = [
        ServiceName::Product,
        ServiceName::Customer,
        ServiceName::Inventory,
        ServiceName::Pricing,
        ServiceName::Order,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceName::Product => "product",
            ServiceName::Customer => "customer",
            ServiceName::Inventory => "inventory",
            ServiceName::Pricing => "pricing",
            ServiceName::Order => "order",
        }
    }

    /// Well-known port of the service's command endpoint.
    pub fn command_port(&self) -> u16 {
        match self {
            ServiceName::Product => 5555,
            ServiceName::Customer => 5556,
            ServiceName::Inventory => 5557,
            ServiceName::Pricing => 5558,
            ServiceName::Order => 5559,
        }
    }

    /// Well-known port of the service's publish endpoint, if it produces facts.
    pub fn publish_port(&self) -> Option<u16> {
        match self {
            ServiceName::Product => Some(5560),
            ServiceName::Customer => Some(5561),
            ServiceName::Order => Some(5562),
            ServiceName::Inventory | ServiceName::Pricing => None,
        }
    }

    /// Well-known port of the peer endpoint the service answers on, if any.
    ///
    /// Both peer relationships are hard-wired to the product service as the
    /// asking side.
    pub fn peer_port(&self) -> Option<u16> {
        match self {
            ServiceName::Pricing => Some(5563),
            ServiceName::Inventory => Some(5564),
            ServiceName::Product | ServiceName::Customer | ServiceName::Order => None,
        }
    }
}

impl std::fmt::Display for ServiceName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown service name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownService(pub String);

impl std::fmt::Display for UnknownService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown service: {}", self.0)
    }
}

impl std::error::Error for UnknownService {}

impl FromStr for ServiceName {
    type Err = UnknownService;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        let name = normalized.strip_suffix("-service").unwrap_or(&normalized);
        ServiceName::ALL
            .into_iter()
            .find(|service| service.as_str() == name)
            .ok_or_else(|| UnknownService(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_id_new_creates_unique_ids() {
        let id1 = RecordId::new();
        let id2 = RecordId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn record_id_parse_rejects_non_uuid() {
        assert!(RecordId::parse("id-inexistant").is_none());
        let id = RecordId::new();
        assert_eq!(RecordId::parse(&id.to_string()), Some(id));
    }

    #[test]
    fn record_id_serializes_as_plain_string() {
        let id = RecordId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
        let back: RecordId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn service_name_parses_with_and_without_suffix() {
        assert_eq!("pricing".parse::<ServiceName>(), Ok(ServiceName::Pricing));
        assert_eq!(
            "inventory-service".parse::<ServiceName>(),
            Ok(ServiceName::Inventory)
        );
        assert_eq!(" Order ".parse::<ServiceName>(), Ok(ServiceName::Order));
        assert!("gateway".parse::<ServiceName>().is_err());
    }

    #[test]
    fn well_known_ports_do_not_collide() {
        let mut ports: Vec<u16> = ServiceName::ALL
            .iter()
            .flat_map(|s| {
                [Some(s.command_port()), s.publish_port(), s.peer_port()]
                    .into_iter()
                    .flatten()
            })
            .collect();
        let total = ports.len();
        ports.sort_unstable();
        ports.dedup();
        assert_eq!(ports.len(), total);
        assert_eq!(total, 10);
    }
}
