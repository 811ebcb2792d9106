use std::pin::Pin;
use std::time::Duration;

use futures_core::Stream;
use futures_util::{SinkExt, StreamExt, stream};

use super::Control;
use crate::envelope::BroadcastFrame;
use crate::error::{FabricError, Result};
use crate::frame::{self, Connection};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Frames received on a subscription, in publish order.
///
/// The stream ends when the publisher goes away. A frame that fails to
/// decode is yielded as an error item and does not end the stream.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<BroadcastFrame>> + Send>>;

/// A consumer's connection to one publisher.
#[derive(Debug)]
pub struct Subscription {
    endpoint: String,
    prefixes: Vec<String>,
    conn: Connection,
}

impl Subscription {
    /// Connects to `endpoint` and registers every prefix.
    ///
    /// Frames published before the publisher has processed the registration
    /// are never delivered.
    pub async fn connect<I, P>(endpoint: &str, prefixes: I) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        let mut conn = frame::connect(endpoint, CONNECT_TIMEOUT).await?;
        let prefixes: Vec<String> = prefixes.into_iter().map(Into::into).collect();
        for prefix in &prefixes {
            conn.send(Control::Subscribe(prefix.clone()).encode()).await?;
        }
        tracing::info!(endpoint, ?prefixes, "subscribed");
        Ok(Self {
            endpoint: endpoint.to_string(),
            prefixes,
            conn,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    /// Registers one more prefix on the open connection.
    pub async fn add_prefix(&mut self, prefix: impl Into<String>) -> Result<()> {
        let prefix = prefix.into();
        self.conn.send(Control::Subscribe(prefix.clone()).encode()).await?;
        self.prefixes.push(prefix);
        Ok(())
    }

    /// Waits for the next frame; `None` once the publisher has closed the connection.
    pub async fn next_frame(&mut self) -> Option<Result<BroadcastFrame>> {
        match self.conn.next().await? {
            Ok(line) => Some(BroadcastFrame::decode(&line)),
            Err(e) => {
                tracing::debug!(endpoint = %self.endpoint, error = %e, "subscription failed");
                Some(Err(FabricError::from(e)))
            }
        }
    }

    pub fn into_stream(self) -> FrameStream {
        Box::pin(stream::unfold(self, |mut subscription| async move {
            let item = subscription.next_frame().await?;
            Some((item, subscription))
        }))
    }
}
