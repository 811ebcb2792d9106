//! The command channel: synchronous request/response against the service
//! owning a resource.

mod client;
mod pool;
mod server;

use async_trait::async_trait;
use serde_json::Value;

use crate::envelope::CommandEnvelope;

pub use client::CommandClient;
pub use pool::CommandPool;
pub use server::{CommandServer, dispatch};

/// Business logic behind a command endpoint.
///
/// The server calls `handle` for one command at a time. `Ok` becomes a
/// success reply carrying the value, `Err` a failure reply carrying the
/// error's display text.
#[async_trait]
pub trait CommandHandler: Send + Sync + 'static {
    type Error: std::fmt::Display + Send + 'static;

    /// Service name used in logs and metrics.
    fn service(&self) -> &'static str;

    async fn handle(&self, command: CommandEnvelope) -> Result<Value, Self::Error>;
}
