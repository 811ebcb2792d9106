use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use serde_json::{Map, Value};

use crate::envelope::{CommandEnvelope, ResponseEnvelope};
use crate::error::{CallError, FabricError, Result};
use crate::frame::{self, Connection};

/// A caller's connection to one command endpoint.
///
/// Calls take `&mut self`: a connection carries at most one outstanding
/// request. The connection is opened on first use. After a timeout or an I/O
/// failure it is discarded, since a late reply would otherwise be read as the
/// answer to the next request, and a fresh one is opened on the next call.
#[derive(Debug)]
pub struct CommandClient {
    endpoint: String,
    timeout: Duration,
    conn: Option<Connection>,
}

impl CommandClient {
    /// Creates a client that connects on first use.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout,
            conn: None,
        }
    }

    /// Creates a client and connects immediately.
    pub async fn connect(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let mut client = Self::new(endpoint, timeout);
        client.ensure_connected(timeout).await?;
        Ok(client)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    /// Sends one command and waits up to `timeout` for its reply.
    ///
    /// A `success:false` reply is returned as-is; only transport and envelope
    /// problems are errors.
    #[tracing::instrument(skip(self, data), fields(endpoint = %self.endpoint))]
    pub async fn call(
        &mut self,
        action: &str,
        data: Map<String, Value>,
        timeout: Duration,
    ) -> Result<ResponseEnvelope> {
        let line = CommandEnvelope::new(action, data).encode()?;
        let endpoint = self.endpoint.clone();
        let started = Instant::now();
        let conn = self.ensure_connected(timeout).await?;

        let exchange = async {
            conn.send(line).await?;
            match conn.next().await {
                Some(Ok(reply)) => Ok(reply),
                Some(Err(e)) => Err(FabricError::from(e)),
                None => Err(FabricError::ConnectionClosed {
                    endpoint: endpoint.clone(),
                }),
            }
        };

        // Connecting spends from the same budget as the exchange.
        let remaining = timeout.saturating_sub(started.elapsed());
        let reply = match tokio::time::timeout(remaining, exchange).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                self.conn = None;
                return Err(e);
            }
            Err(_) => {
                tracing::warn!(action, ?timeout, "command timed out; outcome unknown");
                self.conn = None;
                return Err(FabricError::Timeout { endpoint, timeout });
            }
        };

        ResponseEnvelope::decode(&reply)
    }

    /// Sends one command with the client's default timeout and unwraps the
    /// reply into its data, or a [`CallError::Rejected`] for `success:false`.
    pub async fn request(
        &mut self,
        action: &str,
        data: Map<String, Value>,
    ) -> std::result::Result<Value, CallError> {
        let response = self.call(action, data, self.timeout).await?;
        response.into_result().map_err(CallError::Rejected)
    }

    async fn ensure_connected(&mut self, timeout: Duration) -> Result<&mut Connection> {
        let conn = match self.conn.take() {
            Some(conn) => conn,
            None => {
                let conn = frame::connect(&self.endpoint, timeout).await?;
                tracing::debug!(endpoint = %self.endpoint, "connected to command endpoint");
                conn
            }
        };
        Ok(self.conn.insert(conn))
    }
}
