//! Reactive replica builder.
//!
//! A service keeps local replicas of facts owned by other services. Each
//! [`ReplicaHandler`] is bound to one topic prefix and applies matching
//! broadcast frames to the service's store. The [`ReplicaDispatcher`] waits
//! on every subscription at once, hands each frame to the handlers bound to
//! it, and logs and drops frames a handler fails on.

pub mod dispatcher;
pub mod error;
pub mod handler;
mod source;

pub use dispatcher::{ReplicaDispatcher, ReplicaTask};
pub use error::{ReplicaError, Result};
pub use handler::{ReplicaHandler, ReplicaOutcome, ReplicaStats, ReplicaStatsHandle};
