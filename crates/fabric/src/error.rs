//! Fabric error types.

use std::time::Duration;

use thiserror::Error;
use tokio_util::codec::LinesCodecError;

/// Errors raised by the channels themselves.
///
/// Transport errors (`Unavailable`, `Timeout`, `ConnectionClosed`) say nothing
/// about whether the remote side applied the request. Envelope errors
/// (`MalformedEnvelope`) are always local and recoverable.
#[derive(Debug, Error)]
pub enum FabricError {
    /// The endpoint could not be reached.
    #[error("Endpoint {endpoint} unavailable: {source}")]
    Unavailable {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    /// No reply arrived in time. The remote side may still apply the request.
    #[error("No reply from {endpoint} within {timeout:?} (outcome unknown)")]
    Timeout { endpoint: String, timeout: Duration },

    /// The remote side closed the connection before replying.
    #[error("Connection to {endpoint} closed")]
    ConnectionClosed { endpoint: String },

    /// A frame could not be decoded into, or encoded from, an envelope.
    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// A peer answered with an error instead of a response.
    #[error("Peer refused request: {0}")]
    PeerRefused(String),

    /// Line framing failed (oversized frame or socket error).
    #[error("Frame error: {0}")]
    Frame(#[from] LinesCodecError),

    /// A socket-level error outside of framing.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FabricError {
    pub(crate) fn malformed(reason: impl std::fmt::Display) -> Self {
        FabricError::MalformedEnvelope(reason.to_string())
    }

    /// Returns true for failures of the transport rather than of the message.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            FabricError::Unavailable { .. }
                | FabricError::Timeout { .. }
                | FabricError::ConnectionClosed { .. }
                | FabricError::Frame(_)
                | FabricError::Io(_)
        )
    }

    /// Returns true if the request may or may not have been applied.
    ///
    /// Callers must reconcile instead of retrying blindly.
    pub fn outcome_unknown(&self) -> bool {
        matches!(
            self,
            FabricError::Timeout { .. } | FabricError::ConnectionClosed { .. } | FabricError::Frame(_)
        )
    }
}

/// Result type for fabric operations.
pub type Result<T> = std::result::Result<T, FabricError>;

/// Outcome of a command call seen from the caller.
///
/// Keeps a domain rejection (`success:false`) apart from a transport fault.
#[derive(Debug, Error)]
pub enum CallError {
    /// The call never produced a usable reply.
    #[error(transparent)]
    Transport(#[from] FabricError),

    /// The owning service answered with `success:false`.
    #[error("Rejected: {0}")]
    Rejected(String),
}
