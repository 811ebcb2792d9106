//! Multiplexed subscription loop feeding replica handlers.

use std::sync::Arc;
use std::time::Duration;

use fabric::{BroadcastFrame, topic_matches};
use futures_util::StreamExt;
use futures_util::stream::select_all;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::handler::{ReplicaHandler, ReplicaOutcome, ReplicaStatsHandle, StatsTable};
use crate::source;

const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Handlers fed from one publish endpoint.
struct Source {
    endpoint: String,
    handlers: Vec<Arc<dyn ReplicaHandler>>,
}

impl Source {
    fn prefixes(&self) -> Vec<String> {
        let mut prefixes: Vec<String> = Vec::new();
        for handler in &self.handlers {
            let topic = handler.topic().to_string();
            if !prefixes.contains(&topic) {
                prefixes.push(topic);
            }
        }
        prefixes
    }
}

/// Subscribes to every registered publisher and routes each frame to the
/// handlers bound to its topic.
///
/// One frame is fully applied before the next is taken. Waiting is
/// multiplexed across all subscriptions, so a busy publisher never starves a
/// quiet one. A handler failure is logged and counted; the frame is dropped
/// and the loop continues.
pub struct ReplicaDispatcher {
    sources: Vec<Source>,
    stats: watch::Sender<StatsTable>,
    retry_delay: Duration,
}

impl Default for ReplicaDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplicaDispatcher {
    pub fn new() -> Self {
        let (stats, _) = watch::channel(StatsTable::new());
        Self {
            sources: Vec::new(),
            stats,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    /// Delay between attempts to reach an unavailable publisher.
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Binds `handler` to frames of its topic published at `endpoint`.
    pub fn register(&mut self, endpoint: impl Into<String>, handler: Arc<dyn ReplicaHandler>) {
        let endpoint = endpoint.into();
        self.stats.send_modify(|table| {
            table.entry(handler.name()).or_default();
        });
        match self.sources.iter_mut().find(|s| s.endpoint == endpoint) {
            Some(source) => source.handlers.push(handler),
            None => self.sources.push(Source {
                endpoint,
                handlers: vec![handler],
            }),
        }
    }

    pub fn handler_count(&self) -> usize {
        self.sources.iter().map(|s| s.handlers.len()).sum()
    }

    pub fn stats(&self) -> ReplicaStatsHandle {
        ReplicaStatsHandle::new(self.stats.subscribe())
    }

    /// Hands one frame to every handler bound to its topic.
    #[tracing::instrument(skip(self, frame), fields(topic = %frame.topic))]
    pub async fn deliver(&self, frame: &BroadcastFrame) {
        for source in &self.sources {
            self.deliver_to(&source.handlers, frame).await;
        }
    }

    async fn deliver_to(&self, handlers: &[Arc<dyn ReplicaHandler>], frame: &BroadcastFrame) {
        for handler in handlers {
            if !topic_matches(&frame.topic, handler.topic()) {
                continue;
            }
            let name = handler.name();
            let worker = Arc::clone(handler);
            let owned = frame.clone();
            let applied = tokio::spawn(async move { worker.apply(&owned).await }).await;

            match applied {
                Ok(Ok(outcome)) => {
                    tracing::debug!(handler = name, outcome = outcome.label(), "frame applied");
                    if let ReplicaOutcome::Skipped(reason) = &outcome {
                        tracing::warn!(handler = name, %reason, "frame skipped");
                    }
                    metrics::counter!("replica_frames_applied_total", "handler" => name, "outcome" => outcome.label())
                        .increment(1);
                    self.stats.send_modify(|table| table.entry(name).or_default().record(&outcome));
                }
                Ok(Err(e)) => {
                    tracing::warn!(handler = name, error = %e, "frame dropped");
                    self.record_failure(name);
                }
                Err(e) => {
                    tracing::error!(handler = name, error = %e, "replica handler failed");
                    self.record_failure(name);
                }
            }
        }
    }

    fn record_failure(&self, name: &'static str) {
        metrics::counter!("replica_frames_failed_total", "handler" => name).increment(1);
        self.stats.send_modify(|table| table.entry(name).or_default().failed += 1);
    }

    /// Runs until `token` is cancelled.
    pub async fn run(self, token: CancellationToken) {
        let streams = self.sources.iter().enumerate().map(|(index, s)| {
            tracing::info!(endpoint = %s.endpoint, prefixes = ?s.prefixes(), "replica subscription starting");
            source::reconnecting(s.endpoint.clone(), s.prefixes(), self.retry_delay)
                .map(move |item| (index, item))
                .boxed()
        });
        let mut merged = select_all(streams);

        if merged.is_empty() {
            token.cancelled().await;
            return;
        }

        loop {
            let next = tokio::select! {
                _ = token.cancelled() => break,
                next = merged.next() => next,
            };
            match next {
                Some((index, Ok(frame))) => self.deliver_to(&self.sources[index].handlers, &frame).await,
                Some((index, Err(e))) => {
                    tracing::warn!(endpoint = %self.sources[index].endpoint, error = %e, "undecodable frame dropped");
                    metrics::counter!("replica_frames_failed_total", "handler" => "decode").increment(1);
                }
                None => break,
            }
        }
        tracing::info!("replica dispatcher stopped");
    }

    /// Runs the dispatcher on a background task.
    pub fn spawn(self) -> ReplicaTask {
        let token = CancellationToken::new();
        let stats = self.stats();
        let task = tokio::spawn(self.run(token.clone()));
        ReplicaTask { token, stats, task }
    }
}

/// A dispatcher running in the background.
#[derive(Debug)]
pub struct ReplicaTask {
    token: CancellationToken,
    stats: ReplicaStatsHandle,
    task: JoinHandle<()>,
}

impl ReplicaTask {
    pub fn stats(&self) -> &ReplicaStatsHandle {
        &self.stats
    }

    pub fn shutdown(&self) {
        self.token.cancel();
    }

    pub async fn stop(self) {
        self.token.cancel();
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "replica dispatcher task failed");
        }
    }
}
