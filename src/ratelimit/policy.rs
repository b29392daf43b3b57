//! Named attempt limits for callers of the rate limiter.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::limiter::RateLimiter;

/// How many attempts a caller may make inside a trailing window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptPolicy {
    /// Attempts allowed inside the window before callers are over limit
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Window size in milliseconds
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
}

impl Default for AttemptPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            window_ms: default_window_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    5
}

fn default_window_ms() -> u64 {
    60_000
}

impl AttemptPolicy {
    pub fn new(max_attempts: u32, window: Duration) -> Self {
        Self {
            max_attempts,
            window_ms: window.as_millis() as u64,
        }
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    /// Record an attempt for `key` under this policy. Returns `true` when over limit.
    pub fn check(&self, limiter: &RateLimiter, key: &str) -> bool {
        limiter.check_and_record(key, self.max_attempts, self.window_ms)
    }

    /// Attempts `key` has left under this policy.
    pub fn remaining(&self, limiter: &RateLimiter, key: &str) -> u32 {
        limiter.remaining_attempts(key, self.max_attempts, self.window_ms)
    }
}

/// Build a composite key such as `login:10.0.0.1`.
pub fn policy_key(action: &str, subject: &str) -> String {
    format!("{}:{}", action, subject)
}
