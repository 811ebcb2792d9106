use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio_util::codec::LinesCodecError;
use tokio_util::sync::CancellationToken;

use super::CommandHandler;
use crate::envelope::{CommandEnvelope, ResponseEnvelope};
use crate::error::Result;
use crate::frame;
use crate::lifecycle::ServerHandle;

/// Commands waiting for the dispatch task.
const QUEUE_DEPTH: usize = 256;

struct PendingCommand {
    frame: String,
    reply: oneshot::Sender<ResponseEnvelope>,
}

/// A bound command endpoint.
///
/// Any number of callers may be connected. Their frames are funnelled into a
/// single dispatch task, so one command (including its unit of work) is fully
/// handled before the next one starts.
pub struct CommandServer {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl CommandServer {
    pub async fn bind(addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Self::from_listener(listener)
    }

    pub fn from_listener(listener: TcpListener) -> Result<Self> {
        let local_addr = listener.local_addr()?;
        Ok(Self { listener, local_addr })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serves `handler` on a background task.
    pub fn spawn<H: CommandHandler>(self, handler: Arc<H>) -> ServerHandle {
        let token = CancellationToken::new();
        let local_addr = self.local_addr;
        let task = tokio::spawn(self.serve(handler, token.clone()));
        ServerHandle::new(local_addr, token, task)
    }

    /// Accepts callers until `token` is cancelled.
    pub async fn serve<H: CommandHandler>(self, handler: Arc<H>, token: CancellationToken) {
        let service = handler.service();
        let (queue, pending) = mpsc::channel(QUEUE_DEPTH);
        let dispatcher = tokio::spawn(dispatch_loop(handler, pending));

        tracing::info!(service, addr = %self.local_addr, "command endpoint listening");

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        tracing::debug!(service, %peer, "caller connected");
                        tokio::spawn(serve_caller(stream, peer, queue.clone(), token.child_token()));
                    }
                    Err(e) => tracing::warn!(service, error = %e, "accept failed"),
                },
            }
        }

        drop(queue);
        if let Err(e) = dispatcher.await {
            tracing::error!(service, error = %e, "dispatch task failed");
        }
        tracing::info!(service, "command endpoint stopped");
    }
}

/// Reads frames from one caller, one at a time, and writes back each reply
/// before reading the next frame.
async fn serve_caller(
    stream: TcpStream,
    peer: SocketAddr,
    queue: mpsc::Sender<PendingCommand>,
    token: CancellationToken,
) {
    let mut conn = frame::framed(stream);

    loop {
        let next = tokio::select! {
            _ = token.cancelled() => break,
            next = conn.next() => next,
        };

        let response = match next {
            None => break,
            Some(Ok(frame)) => {
                let (reply, answer) = oneshot::channel();
                if queue.send(PendingCommand { frame, reply }).await.is_err() {
                    break;
                }
                answer
                    .await
                    .unwrap_or_else(|_| ResponseEnvelope::failure("service is shutting down"))
            }
            Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                metrics::counter!("fabric_malformed_frames_total").increment(1);
                ResponseEnvelope::failure(format!(
                    "Malformed envelope: frame exceeds {} bytes",
                    frame::MAX_FRAME_LEN
                ))
            }
            Some(Err(LinesCodecError::Io(e))) => {
                tracing::debug!(%peer, error = %e, "caller connection failed");
                break;
            }
        };

        let line = match response.encode() {
            Ok(line) => line,
            // Oversized replies become a failure the caller can still read.
            Err(e) => {
                tracing::warn!(%peer, error = %e, "response could not be framed");
                metrics::counter!("fabric_unframed_responses_total").increment(1);
                ResponseEnvelope::failure(e.to_string())
                    .encode()
                    .unwrap_or_else(|_| r#"{"success":false,"error":"internal error"}"#.to_string())
            }
        };
        if let Err(e) = conn.send(line).await {
            tracing::debug!(%peer, error = %e, "failed to write response");
            break;
        }
    }

    tracing::debug!(%peer, "caller disconnected");
}

async fn dispatch_loop<H: CommandHandler>(handler: Arc<H>, mut pending: mpsc::Receiver<PendingCommand>) {
    while let Some(PendingCommand { frame, reply }) = pending.recv().await {
        let response = dispatch(&handler, &frame).await;
        // The caller may have gone away; the command was still applied.
        let _ = reply.send(response);
    }
}

/// Decodes and handles a single frame, always producing exactly one response.
///
/// A malformed frame never reaches the handler. A handler that panics yields
/// a failure response instead of taking the dispatch task down.
#[tracing::instrument(skip_all, fields(service = handler.service()))]
pub async fn dispatch<H: CommandHandler>(handler: &Arc<H>, frame: &str) -> ResponseEnvelope {
    let service = handler.service();
    let command = match CommandEnvelope::decode(frame) {
        Ok(command) => command,
        Err(e) => {
            tracing::warn!(error = %e, "rejected malformed command");
            metrics::counter!("fabric_commands_total", "service" => service, "outcome" => "malformed")
                .increment(1);
            return ResponseEnvelope::failure(e.to_string());
        }
    };

    let action = command.action.clone();
    let started = Instant::now();
    let worker = Arc::clone(handler);
    let outcome = tokio::spawn(async move { worker.handle(command).await }).await;

    let (response, label) = match outcome {
        Ok(Ok(data)) => {
            tracing::debug!(%action, "command succeeded");
            (ResponseEnvelope::success(data), "success")
        }
        Ok(Err(e)) => {
            tracing::debug!(%action, error = %e, "command rejected");
            (ResponseEnvelope::failure(e.to_string()), "rejected")
        }
        Err(e) => {
            tracing::error!(%action, error = %e, "command handler failed");
            (
                ResponseEnvelope::failure(format!("internal error while handling {action}")),
                "error",
            )
        }
    };

    metrics::counter!("fabric_commands_total", "service" => service, "outcome" => label).increment(1);
    metrics::histogram!("fabric_command_duration_seconds", "service" => service)
        .record(started.elapsed().as_secs_f64());

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{Value, json};

    struct Echo;

    #[async_trait]
    impl CommandHandler for Echo {
        type Error = String;

        fn service(&self) -> &'static str {
            "echo"
        }

        async fn handle(&self, command: CommandEnvelope) -> std::result::Result<Value, String> {
            match command.action.as_str() {
                "echo" => Ok(Value::Object(command.data)),
                "panic" => panic!("boom"),
                other => Err(format!("unknown action: {other}")),
            }
        }
    }

    #[tokio::test]
    async fn dispatch_success_and_rejection() {
        let handler = Arc::new(Echo);

        let ok = dispatch(&handler, r#"{"action":"echo","data":{"a":1}}"#).await;
        assert_eq!(ok, ResponseEnvelope::success(json!({"a": 1})));

        let rejected = dispatch(&handler, r#"{"action":"nope","data":{}}"#).await;
        assert_eq!(rejected, ResponseEnvelope::failure("unknown action: nope"));
    }

    #[tokio::test]
    async fn dispatch_turns_malformed_frame_into_failure() {
        let handler = Arc::new(Echo);
        let response = dispatch(&handler, "{not json").await;
        assert!(!response.success);
        assert!(response.error.unwrap().starts_with("Malformed envelope"));
    }

    #[tokio::test]
    async fn dispatch_survives_handler_panic() {
        let handler = Arc::new(Echo);
        let response = dispatch(&handler, r#"{"action":"panic"}"#).await;
        assert_eq!(
            response,
            ResponseEnvelope::failure("internal error while handling panic")
        );

        let after = dispatch(&handler, r#"{"action":"echo","data":{}}"#).await;
        assert!(after.success);
    }
}
