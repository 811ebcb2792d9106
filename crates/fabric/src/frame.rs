//! Line framing over TCP.

use std::time::Duration;

use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LinesCodec};

use crate::error::{FabricError, Result};

/// Largest accepted frame, in bytes.
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// A TCP connection carrying one text frame per line.
pub type Connection = Framed<TcpStream, LinesCodec>;

/// Wraps an accepted or connected stream in the line codec.
pub fn framed(stream: TcpStream) -> Connection {
    if let Err(e) = stream.set_nodelay(true) {
        tracing::debug!(error = %e, "failed to set TCP_NODELAY");
    }
    Framed::new(stream, LinesCodec::new_with_max_length(MAX_FRAME_LEN))
}

/// Connects to `endpoint`, failing with `Unavailable` if it cannot be reached
/// within `timeout`.
pub async fn connect(endpoint: &str, timeout: Duration) -> Result<Connection> {
    let attempt = tokio::time::timeout(timeout, TcpStream::connect(endpoint)).await;
    match attempt {
        Ok(Ok(stream)) => Ok(framed(stream)),
        Ok(Err(source)) => Err(FabricError::Unavailable {
            endpoint: endpoint.to_string(),
            source,
        }),
        Err(_) => Err(FabricError::Unavailable {
            endpoint: endpoint.to_string(),
            source: std::io::Error::new(std::io::ErrorKind::TimedOut, "connect timed out"),
        }),
    }
}
