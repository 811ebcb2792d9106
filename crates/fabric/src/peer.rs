//! The peer channel: a private query vocabulary between two services.
//!
//! Each pair of services agrees on a [`PeerProtocol`] naming the request and
//! response types. One side binds a [`PeerResponder`], the other holds a
//! [`PeerClient`]. Exchanges are strictly ping-pong.

use std::fmt::Debug;
use std::marker::PhantomData;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::envelope::fits_frame;
use crate::error::{FabricError, Result};
use crate::frame::{self, Connection};
use crate::lifecycle::ServerHandle;

/// A typed request/response contract between two services.
pub trait PeerProtocol: Send + Sync + 'static {
    /// Name used in logs and metrics.
    const NAME: &'static str;

    type Request: Serialize + DeserializeOwned + Debug + Send + Sync + 'static;
    type Response: Serialize + DeserializeOwned + Debug + Send + Sync + 'static;
}

/// What a responder writes back: an answer, or `{"error": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PeerReply<T> {
    Failed { error: String },
    Answered(T),
}

/// Answers requests of one protocol.
#[async_trait]
pub trait PeerHandler<P: PeerProtocol>: Send + Sync + 'static {
    async fn answer(&self, request: P::Request) -> P::Response;
}

/// The asking side of a peer relationship.
///
/// Connects on first use and reconnects after any failure, like
/// [`CommandClient`](crate::CommandClient).
#[derive(Debug)]
pub struct PeerClient<P: PeerProtocol> {
    endpoint: String,
    timeout: Duration,
    conn: Option<Connection>,
    _protocol: PhantomData<fn() -> P>,
}

impl<P: PeerProtocol> PeerClient<P> {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout,
            conn: None,
            _protocol: PhantomData,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Sends one request and waits for its answer.
    #[tracing::instrument(skip(self), fields(protocol = P::NAME, endpoint = %self.endpoint))]
    pub async fn request(&mut self, request: &P::Request) -> Result<P::Response> {
        let line = fits_frame(
            serde_json::to_string(request).map_err(FabricError::malformed)?,
            "peer request",
        )?;
        let endpoint = self.endpoint.clone();
        let timeout = self.timeout;

        let conn = match self.conn.take() {
            Some(conn) => conn,
            None => frame::connect(&endpoint, timeout).await?,
        };
        let conn = self.conn.insert(conn);

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

        let reply = match tokio::time::timeout(timeout, exchange).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                self.conn = None;
                return Err(e);
            }
            Err(_) => {
                self.conn = None;
                return Err(FabricError::Timeout { endpoint, timeout });
            }
        };

        metrics::counter!("fabric_peer_requests_total", "protocol" => P::NAME).increment(1);
        match serde_json::from_str::<PeerReply<P::Response>>(&reply).map_err(FabricError::malformed)? {
            PeerReply::Answered(response) => Ok(response),
            PeerReply::Failed { error } => Err(FabricError::PeerRefused(error)),
        }
    }
}

/// The answering side of a peer relationship.
///
/// Serves one peer connection at a time; a second connection waits until
/// the first one closes.
pub struct PeerResponder<P: PeerProtocol> {
    listener: TcpListener,
    local_addr: SocketAddr,
    _protocol: PhantomData<fn() -> P>,
}

impl<P: PeerProtocol> PeerResponder<P> {
    pub async fn bind(addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Self::from_listener(listener)
    }

    pub fn from_listener(listener: TcpListener) -> Result<Self> {
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
            _protocol: PhantomData,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn spawn<H: PeerHandler<P>>(self, handler: Arc<H>) -> ServerHandle {
        let token = CancellationToken::new();
        let local_addr = self.local_addr;
        let task = tokio::spawn(self.serve(handler, token.clone()));
        ServerHandle::new(local_addr, token, task)
    }

    pub async fn serve<H: PeerHandler<P>>(self, handler: Arc<H>, token: CancellationToken) {
        tracing::info!(protocol = P::NAME, addr = %self.local_addr, "peer endpoint listening");
        loop {
            let accepted = tokio::select! {
                _ = token.cancelled() => break,
                accepted = self.listener.accept() => accepted,
            };
            match accepted {
                Ok((stream, peer)) => {
                    tracing::debug!(protocol = P::NAME, %peer, "peer connected");
                    let conn = frame::framed(stream);
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = serve_peer::<P, H>(conn, &handler) => {}
                    }
                    tracing::debug!(protocol = P::NAME, %peer, "peer disconnected");
                }
                Err(e) => tracing::warn!(protocol = P::NAME, error = %e, "accept failed"),
            }
        }
        tracing::info!(protocol = P::NAME, "peer endpoint stopped");
    }
}

async fn serve_peer<P: PeerProtocol, H: PeerHandler<P>>(mut conn: Connection, handler: &Arc<H>) {
    while let Some(next) = conn.next().await {
        let line = match next {
            Ok(line) => line,
            Err(e) => {
                tracing::debug!(protocol = P::NAME, error = %e, "peer connection failed");
                break;
            }
        };
        let reply = answer::<P, H>(handler, &line).await;
        if let Err(e) = conn.send(reply).await {
            tracing::debug!(protocol = P::NAME, error = %e, "failed to write peer reply");
            break;
        }
    }
}

/// Produces the reply line for one request line. Never fails.
async fn answer<P: PeerProtocol, H: PeerHandler<P>>(handler: &Arc<H>, line: &str) -> String {
    let reply: PeerReply<P::Response> = match serde_json::from_str::<P::Request>(line) {
        Ok(request) => {
            tracing::debug!(protocol = P::NAME, ?request, "peer request");
            let worker = Arc::clone(handler);
            match tokio::spawn(async move { worker.answer(request).await }).await {
                Ok(response) => PeerReply::Answered(response),
                Err(e) => {
                    tracing::error!(protocol = P::NAME, error = %e, "peer handler failed");
                    PeerReply::Failed {
                        error: "internal error".to_string(),
                    }
                }
            }
        }
        Err(e) => {
            tracing::warn!(protocol = P::NAME, error = %e, "unknown peer request");
            PeerReply::Failed {
                error: "unknown".to_string(),
            }
        }
    };
    let line = serde_json::to_string(&reply)
        .map_err(FabricError::malformed)
        .and_then(|line| fits_frame(line, "peer reply"));
    match line {
        Ok(line) => line,
        Err(e) => {
            tracing::warn!(protocol = P::NAME, error = %e, "peer reply could not be framed");
            serde_json::json!({ "error": e.to_string() }).to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(tag = "action", rename_all = "snake_case")]
    enum Ask {
        Double { value: i64 },
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Answer {
        value: Option<i64>,
    }

    struct Doubling;

    impl PeerProtocol for Doubling {
        const NAME: &'static str = "doubling";
        type Request = Ask;
        type Response = Answer;
    }

    struct Doubler;

    #[async_trait]
    impl PeerHandler<Doubling> for Doubler {
        async fn answer(&self, request: Ask) -> Answer {
            match request {
                Ask::Double { value } => Answer { value: Some(value * 2) },
            }
        }
    }

    #[test]
    fn reply_shapes() {
        let failed: PeerReply<Answer> = serde_json::from_value(json!({"error": "unknown"})).unwrap();
        assert_eq!(
            failed,
            PeerReply::Failed {
                error: "unknown".to_string()
            }
        );

        let answered: PeerReply<Answer> = serde_json::from_value(json!({"value": null})).unwrap();
        assert_eq!(answered, PeerReply::Answered(Answer { value: None }));
        assert_eq!(
            serde_json::to_value(PeerReply::Answered(Answer { value: Some(3) })).unwrap(),
            json!({"value": 3})
        );
    }

    #[tokio::test]
    async fn answer_rejects_unknown_request() {
        let handler = Arc::new(Doubler);
        let reply = answer::<Doubling, _>(&handler, r#"{"action":"triple","value":1}"#).await;
        assert_eq!(reply, r#"{"error":"unknown"}"#);

        let reply = answer::<Doubling, _>(&handler, r#"{"action":"double","value":21}"#).await;
        assert_eq!(reply, r#"{"value":42}"#);
    }

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(tag = "action", rename_all = "snake_case")]
    enum Fill {
        Fill { len: usize },
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Filled {
        text: String,
    }

    struct Filling;

    impl PeerProtocol for Filling {
        const NAME: &'static str = "filling";
        type Request = Fill;
        type Response = Filled;
    }

    struct Filler;

    #[async_trait]
    impl PeerHandler<Filling> for Filler {
        async fn answer(&self, request: Fill) -> Filled {
            match request {
                Fill::Fill { len } => Filled { text: "x".repeat(len) },
            }
        }
    }

    #[tokio::test]
    async fn oversized_answer_is_refused_and_connection_survives() {
        let responder = PeerResponder::<Filling>::bind("127.0.0.1:0").await.unwrap();
        let addr = responder.local_addr();
        let handle = responder.spawn(Arc::new(Filler));

        let mut client = PeerClient::<Filling>::new(addr.to_string(), Duration::from_secs(2));
        let err = client
            .request(&Fill::Fill {
                len: frame::MAX_FRAME_LEN + 1,
            })
            .await
            .unwrap_err();
        match err {
            FabricError::PeerRefused(message) => assert!(message.contains("peer reply exceeds")),
            other => panic!("expected a refusal, got {other:?}"),
        }

        let answer = client.request(&Fill::Fill { len: 3 }).await.unwrap();
        assert_eq!(answer.text, "xxx");

        handle.stop().await;
    }

    #[tokio::test]
    async fn client_and_responder_over_tcp() {
        let responder = PeerResponder::<Doubling>::bind("127.0.0.1:0").await.unwrap();
        let addr = responder.local_addr();
        let handle = responder.spawn(Arc::new(Doubler));

        let mut client = PeerClient::<Doubling>::new(addr.to_string(), Duration::from_secs(2));
        for value in [1, 2, 3] {
            let answer = client.request(&Ask::Double { value }).await.unwrap();
            assert_eq!(answer, Answer { value: Some(value * 2) });
        }

        handle.stop().await;
    }
}
