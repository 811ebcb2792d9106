//! Inter-service messaging fabric.
//!
//! Services never share storage; they talk through three kinds of channel:
//! - [`command`]: synchronous, strictly ping-pong request/response against the
//!   service that owns a resource, served by a sequential dispatch loop
//! - [`broadcast`]: fire-and-forget, at-most-once fan-out of facts by topic
//! - [`peer`]: a dedicated duplex channel between two services carrying a
//!   typed, private query vocabulary
//!
//! Every message is one line of text on a TCP connection (see [`frame`]), and
//! the shapes carried on those lines live in [`envelope`].

pub mod broadcast;
pub mod command;
pub mod endpoint;
pub mod envelope;
pub mod error;
pub mod frame;
pub mod lifecycle;
pub mod peer;

pub use broadcast::{FrameStream, Publisher, Subscription, Tap};
pub use command::{CommandClient, CommandHandler, CommandPool, CommandServer};
pub use endpoint::{Endpoints, ServiceEndpoints};
pub use envelope::{BroadcastFrame, CommandEnvelope, ResponseEnvelope, topic_matches};
pub use error::{CallError, FabricError, Result};
pub use lifecycle::ServerHandle;
pub use peer::{PeerClient, PeerHandler, PeerProtocol, PeerReply, PeerResponder};
