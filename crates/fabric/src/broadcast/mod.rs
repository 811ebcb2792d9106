//! The broadcast channel: fire-and-forget fan-out of facts by topic.
//!
//! A producer owns one [`Publisher`]. Consumers open a [`Subscription`] and
//! announce the topic prefixes they want with `SUB <prefix>` control lines;
//! from then on they receive every matching frame in publish order.
//! Delivery is at-most-once: nothing is replayed to late joiners or across
//! reconnects, and a subscriber that falls too far behind loses frames.

mod publisher;
mod subscriber;

pub use publisher::{Publisher, Tap};
pub use subscriber::{FrameStream, Subscription};

const SUBSCRIBE: &str = "SUB";
const UNSUBSCRIBE: &str = "UNSUB";

/// A control line sent by a subscriber to its publisher.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Control {
    Subscribe(String),
    Unsubscribe(String),
}

impl Control {
    fn encode(&self) -> String {
        match self {
            Control::Subscribe(prefix) => format!("{SUBSCRIBE} {prefix}"),
            Control::Unsubscribe(prefix) => format!("{UNSUBSCRIBE} {prefix}"),
        }
    }

    /// The prefix is everything after the first space; it may be empty.
    fn parse(line: &str) -> Option<Self> {
        let (verb, prefix) = line.split_once(' ').unwrap_or((line, ""));
        match verb {
            SUBSCRIBE => Some(Control::Subscribe(prefix.to_string())),
            UNSUBSCRIBE => Some(Control::Unsubscribe(prefix.to_string())),
            _ => None,
        }
    }
}
