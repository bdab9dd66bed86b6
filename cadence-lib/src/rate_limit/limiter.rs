//! High-level rate limiter implementation.
//!
//! This module wraps the [SlidingWindow] log with the overflow strategies and the drain that
//! grants queued callers as capacity frees up.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::config::{OverflowStrategy, RateLimitConfig};
use crate::error::{CadenceError, RateLimitError, Result};
use crate::rate_limit::queue::WaitQueue;
use crate::rate_limit::window::SlidingWindow;
use crate::rate_limit::wrap::RateLimited;
use crate::scheduler::{self, lock, Generation, TimerSlot};
use crate::telemetry::metrics::MetricsHandle;

/// Lower bound on the delay of a drain attempt.
///
/// Keeps the drain from spinning when the clock reports capacity that has not freed yet.
pub const MIN_DRAIN_DELAY: Duration = Duration::from_millis(10);

struct LimiterState {
    window: SlidingWindow,
    queue: WaitQueue,
    drain: TimerSlot,
}

struct Shared {
    limit: usize,
    window: Duration,
    strategy: OverflowStrategy,
    metrics: Option<MetricsHandle>,
    runtime: Handle,
    state: Mutex<LimiterState>,
}

/// Outcome of the synchronous half of [`RateLimiter::acquire`].
enum Admission {
    Granted,
    Refused,
    Rejected(RateLimitError),
    Queued(oneshot::Receiver<bool>),
}

/// A sliding-window rate limiter allowing `limit` acquisitions per `window`.
///
/// Clones share the same window and queue.
///
/// # Example
/// ```ignore
/// use cadence_lib::rate_limit::{OverflowStrategy, RateLimiter};
/// use std::time::Duration;
///
/// let limiter = RateLimiter::new(2, Duration::from_millis(50), OverflowStrategy::Queue)?;
///
/// if limiter.acquire().await? {
///     send_request().await;
/// }
/// ```
#[derive(Clone)]
pub struct RateLimiter {
    shared: Arc<Shared>,
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("limit", &self.shared.limit)
            .field("window", &self.shared.window)
            .field("strategy", &self.shared.strategy)
            .finish_non_exhaustive()
    }
}

impl RateLimiter {
    /// Create a new rate limiter.
    ///
    /// # Parameters
    /// - `limit`: Maximum number of acquisitions within any `window`
    /// - `window`: Length of the sliding window
    /// - `strategy`: What [`acquire`](Self::acquire) does when no slot is free
    ///
    /// Must be called from within a tokio runtime; queued callers are drained on it.
    pub fn new(limit: usize, window: Duration, strategy: OverflowStrategy) -> Result<Self> {
        Self::build(limit, window, strategy, None)
    }

    /// Create a rate limiter from its configuration section.
    pub fn from_config(config: &RateLimitConfig, metrics: Option<MetricsHandle>) -> Result<Self> {
        Self::build(config.limit, config.window(), config.strategy, metrics)
    }

    fn build(
        limit: usize,
        window: Duration,
        strategy: OverflowStrategy,
        metrics: Option<MetricsHandle>,
    ) -> Result<Self> {
        if limit == 0 {
            return Err(CadenceError::Config("rate limit must be > 0".into()));
        }
        if window.is_zero() {
            return Err(CadenceError::Config("rate limit window must be > 0".into()));
        }
        let runtime = scheduler::runtime()?;
        Ok(Self {
            shared: Arc::new(Shared {
                limit,
                window,
                strategy,
                metrics,
                runtime,
                state: Mutex::new(LimiterState {
                    window: SlidingWindow::new(limit, window),
                    queue: WaitQueue::default(),
                    drain: TimerSlot::default(),
                }),
            }),
        })
    }

    /// Consume a slot if one is free, without waiting.
    pub fn try_acquire(&self) -> bool {
        let granted = lock(&self.shared.state)
            .window
            .try_acquire(Instant::now());
        if let Some(metrics) = &self.shared.metrics {
            metrics.record_rate_limit_request();
            if granted {
                metrics.record_rate_limit_allowed(1);
            } else {
                metrics.record_rate_limit_rejected(self.shared.strategy);
            }
        }
        granted
    }

    /// Acquire a slot, applying the overflow strategy when none is free.
    ///
    /// # Returns
    /// - `Ok(true)` once a slot was consumed for this caller
    /// - `Ok(false)` when refused under [`OverflowStrategy::Drop`]
    /// - `Err(RateLimitError)` when refused under [`OverflowStrategy::Error`]
    ///
    /// Under [`OverflowStrategy::Queue`] the future completes when the drain grants this caller,
    /// in the order callers were queued.
    pub async fn acquire(&self) -> std::result::Result<bool, RateLimitError> {
        match self.admit() {
            Admission::Granted => Ok(true),
            Admission::Refused => Ok(false),
            Admission::Rejected(err) => Err(err),
            Admission::Queued(waiter) => Ok(waiter.await.unwrap_or(false)),
        }
    }

    fn admit(&self) -> Admission {
        let shared = &self.shared;
        if let Some(metrics) = &shared.metrics {
            metrics.record_rate_limit_request();
        }

        let mut state = lock(&shared.state);
        let now = Instant::now();
        if state.window.try_acquire(now) {
            if let Some(metrics) = &shared.metrics {
                metrics.record_rate_limit_allowed(1);
            }
            return Admission::Granted;
        }

        match shared.strategy {
            OverflowStrategy::Drop => {
                if let Some(metrics) = &shared.metrics {
                    metrics.record_rate_limit_rejected(shared.strategy);
                }
                Admission::Refused
            }
            OverflowStrategy::Error => {
                if let Some(metrics) = &shared.metrics {
                    metrics.record_rate_limit_rejected(shared.strategy);
                }
                Admission::Rejected(self.error())
            }
            OverflowStrategy::Queue => {
                if let Some(metrics) = &shared.metrics {
                    metrics.record_rate_limit_queued();
                }
                let waiter = state.queue.push();
                trace!(queued = state.queue.len(), "window full, caller queued");
                self.schedule_drain(&mut state, now);
                Admission::Queued(waiter)
            }
        }
    }

    /// Number of acquisitions still available in the current window.
    pub fn remaining(&self) -> usize {
        lock(&self.shared.state)
            .window
            .remaining(Instant::now())
    }

    /// Time until the oldest consumed slot frees up, zero when a slot is free now.
    pub fn retry_after(&self) -> Duration {
        lock(&self.shared.state)
            .window
            .retry_after(Instant::now())
    }

    /// Number of callers waiting in the queue.
    pub fn queued(&self) -> usize {
        lock(&self.shared.state).queue.len()
    }

    /// Forget every consumed slot and release every queued caller.
    ///
    /// Queued callers are granted unconditionally, without consuming slots.
    pub fn reset(&self) {
        let mut state = lock(&self.shared.state);
        state.window.clear();
        state.drain.cancel();
        let released = state.queue.grant_all();
        debug!(released, "rate limiter reset");
    }

    /// Guard `func` with this limiter. See [`RateLimited::call`].
    pub fn wrap<F>(&self, func: F) -> RateLimited<F> {
        RateLimited::new(self.clone(), func)
    }

    /// Get the configured maximum number of acquisitions per window.
    pub fn limit(&self) -> usize {
        self.shared.limit
    }

    /// Get the configured window duration.
    pub fn window(&self) -> Duration {
        self.shared.window
    }

    /// Get the configured overflow strategy.
    pub fn strategy(&self) -> OverflowStrategy {
        self.shared.strategy
    }

    /// The error describing this limiter's configuration.
    pub fn error(&self) -> RateLimitError {
        RateLimitError::new(self.shared.limit, self.shared.window)
    }

    /// Arm a drain attempt unless one is outstanding or nobody is waiting.
    fn schedule_drain(&self, state: &mut LimiterState, now: Instant) {
        if state.drain.is_armed() || state.queue.is_empty() {
            return;
        }
        let delay = state.window.retry_after(now).max(MIN_DRAIN_DELAY);
        trace!(?delay, "scheduling drain");
        let weak = Arc::downgrade(&self.shared);
        state.drain.arm(&self.shared.runtime, delay, move |generation| {
            if let Some(shared) = weak.upgrade() {
                RateLimiter { shared }.drain(generation);
            }
        });
    }

    fn drain(&self, generation: Generation) {
        let mut state = lock(&self.shared.state);
        if !state.drain.claim(generation) {
            return;
        }

        let now = Instant::now();
        let mut granted = 0u64;
        // A slot is consumed only once the waiter actually received the grant.
        while !state.queue.is_empty() && state.window.remaining(now) > 0 {
            if state.queue.grant_front() && state.window.try_acquire(now) {
                granted += 1;
            }
        }
        if let Some(metrics) = &self.shared.metrics {
            metrics.record_rate_limit_allowed(granted);
        }
        debug!(granted, waiting = state.queue.len(), "drained rate limit queue");

        self.schedule_drain(&mut state, now);
    }
}
