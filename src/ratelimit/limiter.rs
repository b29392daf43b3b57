//! Core sliding-window rate limiter.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, trace};

use super::clock::{Clock, SystemClock};
use super::entry::RateLimitEntry;

/// Default interval between sweeps, and the idle horizon a key must exceed
/// before the sweep evicts it.
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(3600);

/// An in-memory sliding-window rate limiter.
///
/// Each key keeps the timestamps of its recent attempts. Every call to
/// [`RateLimiter::check_and_record`] prunes the history to the caller's
/// window, records the current attempt, and compares the count against the
/// caller's limit. The limiter is thread-safe and can be shared across tasks.
pub struct RateLimiter {
    /// Attempt history indexed by caller-supplied key
    entries: Mutex<HashMap<String, RateLimitEntry>>,
    /// Source of "now"
    clock: Arc<dyn Clock>,
    /// How often the sweep runs and how long a key may sit idle
    cleanup_interval: Duration,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("entries", &self.entry_count())
            .field("cleanup_interval", &self.cleanup_interval)
            .finish()
    }
}

impl RateLimiter {
    /// Create a rate limiter on the system clock with the default cleanup interval.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock), DEFAULT_CLEANUP_INTERVAL)
    }

    /// Create a rate limiter on the system clock with a custom cleanup interval.
    pub fn with_cleanup_interval(cleanup_interval: Duration) -> Self {
        Self::with_clock(Arc::new(SystemClock), cleanup_interval)
    }

    /// Create a rate limiter with an explicit time source.
    pub fn with_clock(clock: Arc<dyn Clock>, cleanup_interval: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
            cleanup_interval,
        }
    }

    /// The configured cleanup interval.
    pub fn cleanup_interval(&self) -> Duration {
        self.cleanup_interval
    }

    /// Record an attempt for `key` and report whether it is over the limit.
    ///
    /// Attempts at or before `now - window_ms` are discarded first, then the
    /// current attempt is appended whether or not it will be admitted. Returns
    /// `true` when the number of attempts in the window is strictly greater
    /// than `max_attempts`, so `max_attempts = 0` rejects every call.
    pub fn check_and_record(&self, key: &str, max_attempts: u32, window_ms: u64) -> bool {
        let now = self.clock.now_millis();
        let cutoff = now.saturating_sub(window_ms);

        let attempts = {
            let mut entries = self.entries.lock();

            let entry = entries.entry(key.to_string()).or_insert_with(|| {
                trace!(key = %key, "Creating new rate limit entry");
                RateLimitEntry::new()
            });

            entry.prune(cutoff);
            entry.record(now);
            entry.len()
        };

        let over_limit = attempts > max_attempts as usize;

        trace!(
            key = %key,
            attempts = attempts,
            max_attempts = max_attempts,
            window_ms = window_ms,
            "Checked rate limit"
        );

        if over_limit {
            debug!(
                key = %key,
                attempts = attempts,
                max_attempts = max_attempts,
                "Rate limit exceeded"
            );
        }

        over_limit
    }

    /// Forget everything recorded for `key`. No-op for unknown keys.
    pub fn reset(&self, key: &str) {
        if self.entries.lock().remove(key).is_some() {
            debug!(key = %key, "Rate limit entry reset");
        }
    }

    /// How many more attempts `key` may make inside the window.
    ///
    /// This only reads the stored history; nothing is pruned or recorded.
    pub fn remaining_attempts(&self, key: &str, max_attempts: u32, window_ms: u64) -> u32 {
        let cutoff = self.clock.now_millis().saturating_sub(window_ms);
        let entries = self.entries.lock();

        match entries.get(key) {
            None => max_attempts,
            Some(entry) => {
                let used = entry.count_after(cutoff).min(u32::MAX as usize) as u32;
                max_attempts.saturating_sub(used)
            }
        }
    }

    /// When the oldest stored attempt for `key` leaves a window of `window_ms`.
    ///
    /// Returns `None` if nothing is recorded for the key.
    pub fn reset_time(&self, key: &str, window_ms: u64) -> Option<u64> {
        let entries = self.entries.lock();
        entries
            .get(key)
            .and_then(RateLimitEntry::oldest)
            .map(|oldest| oldest.saturating_add(window_ms))
    }

    /// Evict every entry that is empty or idle for longer than the cleanup
    /// interval. Returns the number of evicted entries.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now_millis();
        let horizon = now.saturating_sub(self.cleanup_interval.as_millis() as u64);

        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_stale(horizon));
        let evicted = before - entries.len();

        debug!(
            evicted = evicted,
            remaining = entries.len(),
            "Rate limit sweep finished"
        );

        evicted
    }

    /// Stored timestamps for `key`, oldest first.
    pub fn attempts(&self, key: &str) -> Option<Vec<u64>> {
        self.entries.lock().get(key).map(RateLimitEntry::timestamps)
    }

    /// Whether any history is held for `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().contains_key(key)
    }

    /// Clear all entries.
    ///
    /// This is primarily useful for testing.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Get the number of tracked keys.
    pub fn entry_count(&self) -> usize {
        self.entries.lock().len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::ManualClock;

    const START: u64 = 1_700_000_000_000;

    fn manual_limiter() -> (Arc<ManualClock>, RateLimiter) {
        let clock = Arc::new(ManualClock::new(START));
        let limiter = RateLimiter::with_clock(clock.clone(), DEFAULT_CLEANUP_INTERVAL);
        (clock, limiter)
    }

    #[test]
    fn test_rate_limiter_creation() {
        let limiter = RateLimiter::new();
        assert_eq!(limiter.entry_count(), 0);
        assert_eq!(limiter.cleanup_interval(), Duration::from_secs(3600));
    }

    #[test]
    fn test_check_creates_entry() {
        let (_, limiter) = manual_limiter();

        assert!(!limiter.check_and_record("ip1", 2, 1000));
        assert_eq!(limiter.entry_count(), 1);
        assert_eq!(limiter.attempts("ip1"), Some(vec![START]));
    }

    #[test]
    fn test_rapid_calls_block_on_third() {
        let (clock, limiter) = manual_limiter();

        assert!(!limiter.check_and_record("ip1", 2, 1000));
        clock.advance(Duration::from_millis(10));
        assert!(!limiter.check_and_record("ip1", 2, 1000));
        clock.advance(Duration::from_millis(10));
        assert!(limiter.check_and_record("ip1", 2, 1000));
    }

    #[test]
    fn test_zero_attempts_blocks_first_call() {
        let (_, limiter) = manual_limiter();
        assert!(limiter.check_and_record("ip1", 0, 1000));
    }

    #[test]
    fn test_nth_plus_one_call_is_over_limit() {
        let (clock, limiter) = manual_limiter();
        let max = 5;

        for i in 1..=max {
            assert!(
                !limiter.check_and_record("login:10.0.0.1", max, 60_000),
                "Attempt {} should be allowed",
                i
            );
            clock.advance(Duration::from_millis(1));
        }

        assert!(limiter.check_and_record("login:10.0.0.1", max, 60_000));
    }

    #[test]
    fn test_over_limit_calls_still_record() {
        let (clock, limiter) = manual_limiter();

        for _ in 0..4 {
            limiter.check_and_record("ip1", 1, 1000);
            clock.advance(Duration::from_millis(1));
        }

        assert_eq!(limiter.attempts("ip1").unwrap().len(), 4);
    }

    #[test]
    fn test_window_expiry_prunes_old_attempts() {
        let (clock, limiter) = manual_limiter();

        assert!(limiter.check_and_record("ip1", 0, 1000));
        clock.advance(Duration::from_millis(1001));

        // Blocked by this call alone; the first attempt was pruned
        assert!(limiter.check_and_record("ip1", 0, 1000));
        assert_eq!(limiter.attempts("ip1"), Some(vec![START + 1001]));
    }

    #[test]
    fn test_attempt_exactly_at_cutoff_is_pruned() {
        let (clock, limiter) = manual_limiter();

        limiter.check_and_record("ip1", 1, 1000);
        clock.advance(Duration::from_millis(1000));

        assert!(!limiter.check_and_record("ip1", 1, 1000));
        assert_eq!(limiter.attempts("ip1").unwrap().len(), 1);
    }

    #[test]
    fn test_window_slides_under_continuous_abuse() {
        let (clock, limiter) = manual_limiter();
        let window = 1000;

        for _ in 0..50 {
            limiter.check_and_record("abuser", 3, window);
            clock.advance(Duration::from_millis(100));
        }

        let attempts = limiter.attempts("abuser").unwrap();
        let latest = *attempts.last().unwrap();
        // 100ms spacing inside a 1000ms window
        assert!(attempts.len() <= 11);
        assert!(attempts.iter().all(|&ts| ts > latest - window));
    }

    #[test]
    fn test_reset_is_idempotent() {
        let (_, limiter) = manual_limiter();

        limiter.check_and_record("ip1", 2, 1000);
        limiter.check_and_record("ip1", 2, 1000);
        limiter.check_and_record("ip1", 2, 1000);

        limiter.reset("ip1");
        assert!(!limiter.contains("ip1"));
        limiter.reset("ip1");
        assert!(!limiter.contains("ip1"));

        assert!(!limiter.check_and_record("ip1", 2, 1000));
        assert_eq!(limiter.attempts("ip1").unwrap().len(), 1);
    }

    #[test]
    fn test_reset_unknown_key() {
        let (_, limiter) = manual_limiter();
        limiter.reset("never-seen");
        assert_eq!(limiter.entry_count(), 0);
    }

    #[test]
    fn test_keys_are_independent() {
        let (_, limiter) = manual_limiter();

        limiter.check_and_record("login:a", 1, 1000);
        assert!(limiter.check_and_record("login:a", 1, 1000));
        assert!(!limiter.check_and_record("login:b", 1, 1000));
    }

    #[test]
    fn test_remaining_attempts() {
        let (clock, limiter) = manual_limiter();

        assert_eq!(limiter.remaining_attempts("ip1", 5, 1000), 5);

        limiter.check_and_record("ip1", 5, 1000);
        limiter.check_and_record("ip1", 5, 1000);
        assert_eq!(limiter.remaining_attempts("ip1", 5, 1000), 3);

        for _ in 0..10 {
            limiter.check_and_record("ip1", 5, 1000);
        }
        assert_eq!(limiter.remaining_attempts("ip1", 5, 1000), 0);

        clock.advance(Duration::from_millis(1001));
        assert_eq!(limiter.remaining_attempts("ip1", 5, 1000), 5);
        // Read-only: the stale history is still stored
        assert_eq!(limiter.attempts("ip1").unwrap().len(), 12);
    }

    #[test]
    fn test_reset_time() {
        let (clock, limiter) = manual_limiter();

        assert_eq!(limiter.reset_time("ip1", 1000), None);

        limiter.check_and_record("ip1", 5, 1000);
        clock.advance(Duration::from_millis(300));
        limiter.check_and_record("ip1", 5, 1000);

        assert_eq!(limiter.reset_time("ip1", 1000), Some(START + 1000));
    }

    #[test]
    fn test_sweep_evicts_idle_entries() {
        let clock = Arc::new(ManualClock::new(START));
        let limiter = RateLimiter::with_clock(clock.clone(), Duration::from_millis(5000));

        limiter.check_and_record("old", 5, 100);
        clock.advance(Duration::from_millis(4000));
        limiter.check_and_record("fresh", 5, 100);
        clock.advance(Duration::from_millis(1001));

        assert_eq!(limiter.sweep(), 1);
        assert!(!limiter.contains("old"));
        assert!(limiter.contains("fresh"));
    }

    #[test]
    fn test_sweep_ignores_caller_window() {
        let clock = Arc::new(ManualClock::new(START));
        let limiter = RateLimiter::with_clock(clock.clone(), Duration::from_millis(5000));

        // Logically expired for a 10ms window, but not idle long enough to sweep
        limiter.check_and_record("short", 5, 10);
        clock.advance(Duration::from_millis(100));

        assert_eq!(limiter.sweep(), 0);
        assert!(limiter.contains("short"));
    }

    #[test]
    fn test_clear() {
        let (_, limiter) = manual_limiter();

        limiter.check_and_record("a", 1, 1000);
        limiter.check_and_record("b", 1, 1000);
        assert_eq!(limiter.entry_count(), 2);

        limiter.clear();
        assert_eq!(limiter.entry_count(), 0);
    }

    #[test]
    fn test_concurrent_checks_record_every_attempt() {
        let limiter = Arc::new(RateLimiter::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = limiter.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        limiter.check_and_record("shared", 1_000, 60_000);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(limiter.attempts("shared").unwrap().len(), 800);
    }
}
