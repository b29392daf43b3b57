//! Background sweep task that keeps the limiter's memory bounded.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

use super::limiter::RateLimiter;

/// Handle to a running sweep task.
///
/// The task stops when the handle is shut down or dropped.
#[derive(Debug)]
pub struct SweeperHandle {
    handle: JoinHandle<()>,
}

impl SweeperHandle {
    /// Stop the sweep task and wait for it to wind down.
    pub async fn shutdown(mut self) {
        self.handle.abort();
        // A cancelled join is the expected outcome
        let _ = (&mut self.handle).await;
        debug!("Rate limit sweeper stopped");
    }

    /// Whether the task has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Spawn a task that sweeps `limiter` every `cleanup_interval`.
///
/// The first sweep runs one full interval after spawning. Must be called from
/// inside a tokio runtime.
pub fn spawn_sweeper(limiter: Arc<RateLimiter>) -> SweeperHandle {
    // tokio intervals cannot have a zero period
    let period = limiter.cleanup_interval().max(Duration::from_millis(1));

    info!(interval_ms = period.as_millis() as u64, "Starting rate limit sweeper");

    let handle = tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let evicted = limiter.sweep();
            if evicted > 0 {
                debug!(evicted = evicted, "Evicted idle rate limit entries");
            }
        }
    });

    SweeperHandle { handle }
}
