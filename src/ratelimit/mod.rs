//! Rate limiting logic and state management.

mod clock;
mod entry;
mod limiter;
mod policy;
mod sweeper;

pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::RateLimitEntry;
pub use limiter::{RateLimiter, DEFAULT_CLEANUP_INTERVAL};
pub use policy::{policy_key, AttemptPolicy};
pub use sweeper::{spawn_sweeper, SweeperHandle};
