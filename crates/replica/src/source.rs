//! A subscription that reconnects when its publisher goes away.

use std::time::Duration;

use fabric::{BroadcastFrame, FabricError, Subscription};
use futures_util::stream::{self, BoxStream};
use futures_util::StreamExt;

enum Link {
    Down,
    Up(Subscription),
}

/// Frames from `endpoint` matching any of `prefixes`, across reconnects.
///
/// Nothing is replayed after a reconnect: frames published while the link
/// was down are lost. The stream never ends on its own.
pub(crate) fn reconnecting(
    endpoint: String,
    prefixes: Vec<String>,
    retry_delay: Duration,
) -> BoxStream<'static, Result<BroadcastFrame, FabricError>> {
    stream::unfold(Link::Down, move |mut link| {
        let endpoint = endpoint.clone();
        let prefixes = prefixes.clone();
        async move {
            loop {
                link = match link {
                    Link::Up(mut subscription) => match subscription.next_frame().await {
                        Some(item) => return Some((item, Link::Up(subscription))),
                        None => {
                            tracing::warn!(%endpoint, "publisher went away; resubscribing");
                            Link::Down
                        }
                    },
                    Link::Down => match Subscription::connect(&endpoint, prefixes.iter().cloned()).await {
                        Ok(subscription) => Link::Up(subscription),
                        Err(e) => {
                            tracing::debug!(%endpoint, error = %e, "publisher unreachable; retrying");
                            tokio::time::sleep(retry_delay).await;
                            Link::Down
                        }
                    },
                };
            }
        }
    })
    .boxed()
}
