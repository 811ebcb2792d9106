//! Replica error types.

use thiserror::Error;

/// Why a frame could not be applied to a replica.
///
/// These never reach the publisher; the dispatcher logs them and moves on.
#[derive(Debug, Error)]
pub enum ReplicaError {
    /// The payload did not have the shape the handler expects.
    #[error("Invalid payload: {0}")]
    Payload(#[from] serde_json::Error),

    /// The payload is missing the natural key of the replica.
    #[error("Missing natural key: {0}")]
    MissingKey(&'static str),

    /// The local store refused the change.
    #[error("Store error: {0}")]
    Store(#[from] store::StoreError),

    /// The fact contradicts local state in a way the handler cannot resolve.
    #[error("Replica rejected fact: {0}")]
    Rejected(String),
}

/// Result type for replica operations.
pub type Result<T> = std::result::Result<T, ReplicaError>;
