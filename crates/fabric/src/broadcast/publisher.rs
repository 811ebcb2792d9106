use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::Control;
use crate::envelope::{BroadcastFrame, topic_matches, validate_topic};
use crate::error::{FabricError, Result};
use crate::frame;

/// Frames buffered per subscriber before it starts losing them.
const CHANNEL_CAPACITY: usize = 1024;

/// An encoded frame, shared by every subscriber connection.
#[derive(Debug)]
struct Outbound {
    topic: String,
    line: String,
}

#[derive(Debug)]
struct Shared {
    sender: broadcast::Sender<Arc<Outbound>>,
    subscribers: watch::Sender<usize>,
    token: CancellationToken,
    local_addr: Option<SocketAddr>,
}

/// The producing side of the broadcast channel.
///
/// Created once at process start and handed to every component that
/// publishes; clones share the same endpoint. [`shutdown`](Self::shutdown)
/// closes the endpoint and every subscriber connection.
///
/// `publish` never waits for subscribers: frames are queued per connection
/// and written by that connection's own task.
#[derive(Debug, Clone)]
pub struct Publisher {
    shared: Arc<Shared>,
}

impl Publisher {
    /// Binds the publish endpoint and starts accepting subscribers.
    pub async fn bind(addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Self::from_listener(listener)
    }

    pub fn from_listener(listener: TcpListener) -> Result<Self> {
        let local_addr = listener.local_addr()?;
        let publisher = Self::with_addr(Some(local_addr));
        tokio::spawn(accept_subscribers(listener, Arc::clone(&publisher.shared)));
        tracing::info!(addr = %local_addr, "publish endpoint listening");
        Ok(publisher)
    }

    /// A publisher with no network endpoint; only [`tap`](Self::tap)s see its frames.
    pub fn detached() -> Self {
        Self::with_addr(None)
    }

    fn with_addr(local_addr: Option<SocketAddr>) -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (subscribers, _) = watch::channel(0);
        Self {
            shared: Arc::new(Shared {
                sender,
                subscribers,
                token: CancellationToken::new(),
                local_addr,
            }),
        }
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.shared.local_addr
    }

    /// Publishes `payload` under `topic`.
    ///
    /// Returns how many subscribers the frame was queued for; zero is not an
    /// error. Fails only if the frame cannot be encoded.
    pub fn publish<T: Serialize>(&self, topic: &str, payload: &T) -> Result<usize> {
        validate_topic(topic)?;
        let payload = serde_json::to_value(payload).map_err(FabricError::malformed)?;
        self.publish_frame(&BroadcastFrame::new(topic, payload))
    }

    #[tracing::instrument(skip_all, fields(topic = %frame.topic))]
    pub fn publish_frame(&self, frame: &BroadcastFrame) -> Result<usize> {
        let line = frame.encode()?;
        if self.shared.token.is_cancelled() {
            tracing::debug!("publisher is shut down; frame dropped");
            return Ok(0);
        }

        let outbound = Arc::new(Outbound {
            topic: frame.topic.clone(),
            line,
        });
        metrics::counter!("fabric_frames_published_total", "topic" => frame.topic.clone()).increment(1);
        match self.shared.sender.send(outbound) {
            Ok(receivers) => {
                tracing::debug!(receivers, "frame published");
                Ok(receivers)
            }
            Err(_) => {
                tracing::debug!("frame published (no subscribers)");
                Ok(0)
            }
        }
    }

    /// Number of connections that have registered at least one prefix.
    pub fn subscriber_count(&self) -> usize {
        *self.shared.subscribers.borrow()
    }

    /// Waits until at least `n` subscriber connections are registered.
    ///
    /// Frames published after this returns reach those subscribers (if they
    /// match); frames published before a subscriber registered never do.
    pub async fn wait_for_subscribers(&self, n: usize) {
        let mut count = self.shared.subscribers.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = count.wait_for(|current| *current >= n).await;
    }

    /// Observes this publisher's frames in-process.
    pub fn tap(&self, prefix: impl Into<String>) -> Tap {
        Tap {
            prefix: prefix.into(),
            frames: self.shared.sender.subscribe(),
        }
    }

    /// Stops accepting subscribers and closes every subscriber connection.
    pub fn shutdown(&self) {
        if !self.shared.token.is_cancelled() {
            tracing::info!(addr = ?self.shared.local_addr, "publisher shutting down");
        }
        self.shared.token.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.shared.token.is_cancelled()
    }
}

/// An in-process observer of a [`Publisher`], filtered by prefix.
#[derive(Debug)]
pub struct Tap {
    prefix: String,
    frames: broadcast::Receiver<Arc<Outbound>>,
}

impl Tap {
    /// Waits for the next matching frame; `None` once the publisher is gone.
    pub async fn recv(&mut self) -> Option<BroadcastFrame> {
        loop {
            match self.frames.recv().await {
                Ok(outbound) => {
                    if let Some(frame) = self.accept(&outbound) {
                        return Some(frame);
                    }
                }
                Err(RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "tap lagged, frames lost");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Returns the next matching frame already queued, without waiting.
    pub fn try_recv(&mut self) -> Option<BroadcastFrame> {
        loop {
            match self.frames.try_recv() {
                Ok(outbound) => {
                    if let Some(frame) = self.accept(&outbound) {
                        return Some(frame);
                    }
                }
                Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }

    /// Drains every matching frame already queued.
    pub fn drain(&mut self) -> Vec<BroadcastFrame> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    fn accept(&self, outbound: &Outbound) -> Option<BroadcastFrame> {
        if !topic_matches(&outbound.topic, &self.prefix) {
            return None;
        }
        BroadcastFrame::decode(&outbound.line).ok()
    }
}

async fn accept_subscribers(listener: TcpListener, shared: Arc<Shared>) {
    loop {
        tokio::select! {
            _ = shared.token.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    tracing::debug!(%peer, "subscriber connected");
                    tokio::spawn(serve_subscriber(stream, peer, Arc::clone(&shared)));
                }
                Err(e) => tracing::warn!(error = %e, "accept failed"),
            },
        }
    }
    tracing::info!("publish endpoint stopped");
}

async fn next_outbound(
    frames: &mut Option<broadcast::Receiver<Arc<Outbound>>>,
) -> std::result::Result<Arc<Outbound>, RecvError> {
    match frames {
        Some(frames) => frames.recv().await,
        None => std::future::pending().await,
    }
}

/// Feeds one subscriber connection.
///
/// The connection starts receiving frames when its first `SUB` line has been
/// processed; nothing published earlier is delivered.
async fn serve_subscriber(stream: TcpStream, peer: SocketAddr, shared: Arc<Shared>) {
    let mut conn = frame::framed(stream);
    let mut prefixes: Vec<String> = Vec::new();
    let mut frames: Option<broadcast::Receiver<Arc<Outbound>>> = None;
    let token = shared.token.child_token();

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            control = conn.next() => match control {
                Some(Ok(line)) => match Control::parse(&line) {
                    Some(Control::Subscribe(prefix)) => {
                        if frames.is_none() {
                            frames = Some(shared.sender.subscribe());
                            shared.subscribers.send_modify(|count| *count += 1);
                        }
                        tracing::debug!(%peer, %prefix, "subscribed");
                        if !prefixes.contains(&prefix) {
                            prefixes.push(prefix);
                        }
                    }
                    Some(Control::Unsubscribe(prefix)) => {
                        tracing::debug!(%peer, %prefix, "unsubscribed");
                        prefixes.retain(|p| p != &prefix);
                    }
                    None => tracing::warn!(%peer, %line, "ignoring unknown control line"),
                },
                Some(Err(e)) => {
                    tracing::debug!(%peer, error = %e, "subscriber connection failed");
                    break;
                }
                None => break,
            },
            outbound = next_outbound(&mut frames) => match outbound {
                Ok(outbound) => {
                    if !prefixes.iter().any(|p| topic_matches(&outbound.topic, p)) {
                        continue;
                    }
                    if let Err(e) = conn.send(outbound.line.as_str()).await {
                        tracing::debug!(%peer, error = %e, "failed to write frame");
                        break;
                    }
                }
                Err(RecvError::Lagged(n)) => {
                    tracing::warn!(%peer, skipped = n, "subscriber lagged, frames dropped");
                    metrics::counter!("fabric_frames_dropped_total").increment(n);
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    if frames.is_some() {
        shared.subscribers.send_modify(|count| *count = count.saturating_sub(1));
    }
    tracing::debug!(%peer, "subscriber disconnected");
}
