//! Handles for background listeners.

use std::net::SocketAddr;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A listener running on a background task.
///
/// Dropping the handle leaves the listener running; call
/// [`shutdown`](Self::shutdown) to stop it.
#[derive(Debug)]
pub struct ServerHandle {
    local_addr: SocketAddr,
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl ServerHandle {
    pub(crate) fn new(local_addr: SocketAddr, token: CancellationToken, task: JoinHandle<()>) -> Self {
        Self {
            local_addr,
            token,
            task,
        }
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Signals the listener and its open connections to stop.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Stops the listener and waits for it to finish.
    pub async fn stop(self) {
        self.token.cancel();
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, addr = %self.local_addr, "listener task failed");
        }
    }
}
