//! Sliding-window rate limiting.
//!
//! A [`RateLimiter`] allows at most `limit` acquisitions within any rolling `window`. It is
//! built from three pieces:
//!
//! 1. **SlidingWindow** (`window.rs`): oldest-first log of the instants at which slots were
//!    consumed, purged lazily on every query.
//!
//! 2. **WaitQueue** (`queue.rs`): FIFO of callers parked by the `queue` overflow strategy.
//!
//! 3. **RateLimiter** (`limiter.rs`): combines both, applies the overflow strategy and runs the
//!    drain that grants queued callers as slots expire.
//!
//! # Overflow strategies
//!
//! | strategy | `acquire()` with no free slot                |
//! |----------|----------------------------------------------|
//! | `drop`   | resolves to `Ok(false)`                      |
//! | `queue`  | waits in FIFO order, resolves to `Ok(true)`  |
//! | `error`  | fails with [`RateLimitError`]                |
//!
//! # Configuration
//!
//! ```toml
//! [rate_limit]
//! limit = 10
//! window_ms = 1000
//! strategy = "queue"
//! ```

mod limiter;
mod queue;
mod window;
mod wrap;

pub use limiter::{RateLimiter, MIN_DRAIN_DELAY};
pub use wrap::RateLimited;

pub use crate::config::OverflowStrategy;
pub use crate::error::RateLimitError;
