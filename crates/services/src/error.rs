//! Service error types.

use thiserror::Error;

/// Errors returned by service operations.
///
/// Everything except `Config`, `Fabric` and `Io` is a domain failure: the
/// dispatch loop turns it into a `success:false` reply carrying the display
/// text.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The addressed record does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Input failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The record would collide with an existing one.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The action is not part of the service's vocabulary.
    #[error("unknown action: {0}")]
    UnknownAction(String),

    /// The command data does not have the expected shape.
    #[error("Invalid payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    /// The store refused the change.
    #[error("Store error: {0}")]
    Store(#[from] store::StoreError),

    /// The process could not be configured or started.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An endpoint could not be started.
    #[error("Fabric error: {0}")]
    Fabric(#[from] fabric::FabricError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServiceError {
    pub fn not_found(kind: &'static str, id: impl std::fmt::Display) -> Self {
        ServiceError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::Validation(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ServiceError::NotFound { .. })
    }
}

/// Result type for service operations.
pub type Result<T> = std::result::Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_message() {
        let err = ServiceError::not_found("product", "42");
        assert_eq!(err.to_string(), "product not found: 42");
        assert!(err.is_not_found());
    }

    #[test]
    fn unknown_action_message() {
        let err = ServiceError::UnknownAction("explode".to_string());
        assert_eq!(err.to_string(), "unknown action: explode");
    }
}
