//! Replica handler trait and bookkeeping.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use fabric::BroadcastFrame;
use tokio::sync::watch;

use crate::Result;

/// What applying one frame did to the replica.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplicaOutcome {
    /// A replica record was created for the natural key.
    Created,
    /// A record already existed for the natural key and was left untouched.
    AlreadyPresent,
    /// An existing record was changed.
    Adjusted,
    /// The frame did not apply to any local record.
    Skipped(String),
}

impl ReplicaOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            ReplicaOutcome::Created => "created",
            ReplicaOutcome::AlreadyPresent => "already_present",
            ReplicaOutcome::Adjusted => "adjusted",
            ReplicaOutcome::Skipped(_) => "skipped",
        }
    }
}

/// Applies broadcast frames of one topic to a local replica.
///
/// Handlers must not assume any ordering between topics or producers. A
/// handler for a mutating fact creates the record it mutates if it is absent.
#[async_trait]
pub trait ReplicaHandler: Send + Sync {
    /// Returns the name of this handler.
    fn name(&self) -> &'static str;

    /// Topic prefix this handler is bound to.
    fn topic(&self) -> &'static str;

    /// Applies one frame inside a single unit of work.
    async fn apply(&self, frame: &BroadcastFrame) -> Result<ReplicaOutcome>;
}

/// Counts of what a handler did with the frames it received.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplicaStats {
    pub created: u64,
    pub already_present: u64,
    pub adjusted: u64,
    pub skipped: u64,
    pub failed: u64,
}

impl ReplicaStats {
    /// Frames handled, whatever the outcome.
    pub fn frames(&self) -> u64 {
        self.created + self.already_present + self.adjusted + self.skipped + self.failed
    }

    pub(crate) fn record(&mut self, outcome: &ReplicaOutcome) {
        match outcome {
            ReplicaOutcome::Created => self.created += 1,
            ReplicaOutcome::AlreadyPresent => self.already_present += 1,
            ReplicaOutcome::Adjusted => self.adjusted += 1,
            ReplicaOutcome::Skipped(_) => self.skipped += 1,
        }
    }
}

impl std::fmt::Display for ReplicaStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "created={} already_present={} adjusted={} skipped={} failed={}",
            self.created, self.already_present, self.adjusted, self.skipped, self.failed
        )
    }
}

/// Stats of every handler, by handler name.
pub type StatsTable = BTreeMap<&'static str, ReplicaStats>;

/// Read access to per-handler stats of a running dispatcher.
#[derive(Debug, Clone)]
pub struct ReplicaStatsHandle {
    stats: watch::Receiver<StatsTable>,
}

impl ReplicaStatsHandle {
    pub(crate) fn new(stats: watch::Receiver<StatsTable>) -> Self {
        Self { stats }
    }

    /// Current stats of one handler.
    pub fn get(&self, handler: &str) -> ReplicaStats {
        self.stats.borrow().get(handler).copied().unwrap_or_default()
    }

    pub fn all(&self) -> StatsTable {
        self.stats.borrow().clone()
    }

    /// Waits until `handler` has handled at least `frames` frames.
    ///
    /// Returns the stats at that point, or `None` after `timeout`.
    pub async fn wait_for_frames(&self, handler: &str, frames: u64, timeout: Duration) -> Option<ReplicaStats> {
        let mut stats = self.stats.clone();
        let reached = async {
            let table = stats
                .wait_for(|table| table.get(handler).is_some_and(|s| s.frames() >= frames))
                .await
                .ok()?;
            table.get(handler).copied()
        };
        tokio::time::timeout(timeout, reached).await.ok().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_count_every_outcome() {
        let mut stats = ReplicaStats::default();
        stats.record(&ReplicaOutcome::Created);
        stats.record(&ReplicaOutcome::AlreadyPresent);
        stats.record(&ReplicaOutcome::AlreadyPresent);
        stats.record(&ReplicaOutcome::Skipped("no stock".to_string()));
        stats.failed += 1;

        assert_eq!(stats.frames(), 5);
        assert_eq!(
            stats.to_string(),
            "created=1 already_present=2 adjusted=0 skipped=1 failed=1"
        );
    }

    #[test]
    fn outcome_labels() {
        assert_eq!(ReplicaOutcome::Adjusted.label(), "adjusted");
        assert_eq!(ReplicaOutcome::Skipped(String::new()).label(), "skipped");
    }
}
