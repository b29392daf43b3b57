//! Per-key attempt history.

use std::collections::VecDeque;

/// The recorded attempts for a single key.
///
/// Timestamps are appended at "now", so the deque is in chronological order
/// as long as the clock does not run backwards.
#[derive(Debug, Clone, Default)]
pub struct RateLimitEntry {
    timestamps: VecDeque<u64>,
}

impl RateLimitEntry {
    /// Create an entry with no attempts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every timestamp at or before `cutoff`.
    pub fn prune(&mut self, cutoff: u64) {
        self.timestamps.retain(|&ts| ts > cutoff);
    }

    /// Record an attempt at `now`.
    pub fn record(&mut self, now: u64) {
        self.timestamps.push_back(now);
    }

    /// Number of attempts currently held.
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Count attempts strictly after `cutoff` without pruning.
    pub fn count_after(&self, cutoff: u64) -> usize {
        self.timestamps.iter().filter(|&&ts| ts > cutoff).count()
    }

    /// Earliest stored attempt, wherever it sits in the deque.
    pub fn oldest(&self) -> Option<u64> {
        self.timestamps.iter().min().copied()
    }

    /// Most recent stored attempt.
    pub fn latest(&self) -> Option<u64> {
        self.timestamps.iter().max().copied()
    }

    /// Whether the sweep may evict this entry.
    ///
    /// An entry is stale when it holds nothing, or when its most recent
    /// attempt is older than `horizon`.
    pub fn is_stale(&self, horizon: u64) -> bool {
        match self.latest() {
            None => true,
            Some(latest) => latest < horizon,
        }
    }

    /// Snapshot of the stored timestamps, oldest first.
    pub fn timestamps(&self) -> Vec<u64> {
        self.timestamps.iter().copied().collect()
    }
}
