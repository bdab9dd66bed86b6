//! Throttling: run a function at most once per `wait`.
//!
//! A [`Throttle`] executes on the leading edge of a window (synchronously, inside
//! [`Throttle::call`]) and/or on its trailing edge (from a timer, with the arguments of the most
//! recent call). Calls that land inside a window only refresh the pending arguments.
//!
//! # Example
//! ```ignore
//! use cadence_lib::throttle::Throttle;
//! use std::time::Duration;
//!
//! let save = Throttle::leading(|doc: String| persist(doc), Duration::from_millis(500))?;
//! save.call(draft.clone()); // runs now
//! save.call(draft);         // suppressed, inside the window
//! ```

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::config::ThrottleConfig;
use crate::error::{CadenceError, Result};
use crate::scheduler::{self, lock, Generation, TimerSlot};
use crate::telemetry::metrics::{values, MetricsHandle};

/// Edge selection for a [`Throttle`]
#[derive(Debug, Clone)]
pub struct ThrottleOptions {
    /// Execute immediately when a call opens a new window
    pub leading: bool,
    /// Execute once more at the end of the window if calls arrived during it
    pub trailing: bool,
    /// Report calls and executions under this handle's name
    pub metrics: Option<MetricsHandle>,
}

impl Default for ThrottleOptions {
    fn default() -> Self {
        Self { leading: true, trailing: true, metrics: None }
    }
}

impl From<&ThrottleConfig> for ThrottleOptions {
    fn from(config: &ThrottleConfig) -> Self {
        Self { leading: config.leading, trailing: config.trailing, metrics: None }
    }
}

struct ThrottleState<A> {
    last_exec: Option<Instant>,
    pending_args: Option<A>,
    timer: TimerSlot,
}

struct Shared<A, R> {
    func: Box<dyn Fn(A) -> R + Send + Sync>,
    wait: Duration,
    leading: bool,
    trailing: bool,
    metrics: Option<MetricsHandle>,
    runtime: Handle,
    state: Mutex<ThrottleState<A>>,
}

/// A function wrapped so that it executes at most once per `wait`.
///
/// Clones share the same state.
pub struct Throttle<A, R> {
    shared: Arc<Shared<A, R>>,
}

impl<A, R> Clone for Throttle<A, R> {
    fn clone(&self) -> Self {
        Self { shared: Arc::clone(&self.shared) }
    }
}

impl<A, R> fmt::Debug for Throttle<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Throttle")
            .field("wait", &self.shared.wait)
            .field("leading", &self.shared.leading)
            .field("trailing", &self.shared.trailing)
            .finish_non_exhaustive()
    }
}

impl<A, R> Throttle<A, R>
where
    A: Send + 'static,
    R: Send + 'static,
{
    /// Wrap `func` so it runs at most once per `wait`.
    ///
    /// Must be called from within a tokio runtime; trailing executions are scheduled on it.
    /// With both edges disabled the wrapper records arguments but never executes.
    pub fn new<F>(func: F, wait: Duration, options: ThrottleOptions) -> Result<Self>
    where
        F: Fn(A) -> R + Send + Sync + 'static,
    {
        if wait.is_zero() {
            return Err(CadenceError::Config("throttle wait must be > 0".into()));
        }
        let runtime = scheduler::runtime()?;
        Ok(Self {
            shared: Arc::new(Shared {
                func: Box::new(func),
                wait,
                leading: options.leading,
                trailing: options.trailing,
                metrics: options.metrics,
                runtime,
                state: Mutex::new(ThrottleState {
                    last_exec: None,
                    pending_args: None,
                    timer: TimerSlot::default(),
                }),
            }),
        })
    }

    /// Leading-edge only: the first call of each window runs, the rest are dropped.
    pub fn leading<F>(func: F, wait: Duration) -> Result<Self>
    where
        F: Fn(A) -> R + Send + Sync + 'static,
    {
        Self::new(func, wait, ThrottleOptions { leading: true, trailing: false, metrics: None })
    }

    /// Trailing-edge only: each window ends with one run using the latest arguments.
    pub fn trailing<F>(func: F, wait: Duration) -> Result<Self>
    where
        F: Fn(A) -> R + Send + Sync + 'static,
    {
        Self::new(func, wait, ThrottleOptions { leading: false, trailing: true, metrics: None })
    }

    /// Invoke the throttled function.
    ///
    /// Returns the function's result when this call executed it on the leading edge, `None`
    /// when the call was deferred to the trailing edge or suppressed.
    pub fn call(&self, args: A) -> Option<R> {
        let shared = &self.shared;
        if let Some(metrics) = &shared.metrics {
            metrics.record_throttle_call();
        }

        let leading_args = {
            let mut state = lock(&shared.state);
            let now = Instant::now();
            let elapsed = state.last_exec.map(|at| now.saturating_duration_since(at));
            let window_open = elapsed.is_none_or(|elapsed| elapsed >= shared.wait);
            state.pending_args = Some(args);

            // Before the first execution an armed timer is still closing the first window.
            if window_open && elapsed.is_some() {
                state.timer.cancel();
            }

            let mut leading_args = None;
            if window_open && shared.leading {
                state.last_exec = Some(now);
                leading_args = state.pending_args.take();
            }

            if shared.trailing && state.pending_args.is_some() && !state.timer.is_armed() {
                let delay = match elapsed {
                    Some(elapsed) => shared.wait.saturating_sub(elapsed),
                    None => shared.wait,
                };
                trace!(?delay, "scheduling trailing execution");
                self.schedule_trailing(&mut state, delay);
            }
            leading_args
        }?;

        if let Some(metrics) = &shared.metrics {
            metrics.record_throttle_execution(values::EDGE_LEADING);
        }
        Some((shared.func)(leading_args))
    }

    /// Drop the scheduled trailing execution and its arguments.
    pub fn cancel(&self) {
        let mut state = lock(&self.shared.state);
        if state.timer.is_armed() {
            debug!("throttle cancelled with a pending trailing execution");
        }
        state.timer.cancel();
        state.pending_args = None;
    }

    /// Run the scheduled trailing execution now.
    ///
    /// Returns `None` without doing anything when no trailing execution is scheduled.
    pub fn flush(&self) -> Option<R> {
        let args = {
            let mut state = lock(&self.shared.state);
            if !state.timer.is_armed() {
                return None;
            }
            let args = state.pending_args.take()?;
            state.timer.cancel();
            state.last_exec = Some(Instant::now());
            args
        };

        if let Some(metrics) = &self.shared.metrics {
            metrics.record_throttle_execution(values::EDGE_FLUSH);
        }
        Some((self.shared.func)(args))
    }

    /// True while a trailing execution is scheduled.
    pub fn is_pending(&self) -> bool {
        lock(&self.shared.state).timer.is_armed()
    }

    /// Get the minimum spacing between executions.
    pub fn wait(&self) -> Duration {
        self.shared.wait
    }

    fn schedule_trailing(&self, state: &mut ThrottleState<A>, delay: Duration) {
        let weak = Arc::downgrade(&self.shared);
        state.timer.arm(&self.shared.runtime, delay, move |generation| {
            if let Some(shared) = weak.upgrade() {
                Throttle { shared }.fire_trailing(generation);
            }
        });
    }

    fn fire_trailing(&self, generation: Generation) {
        let args = {
            let mut state = lock(&self.shared.state);
            if !state.timer.claim(generation) {
                return;
            }
            let Some(args) = state.pending_args.take() else {
                return;
            };
            state.last_exec = Some(Instant::now());
            args
        };

        if let Some(metrics) = &self.shared.metrics {
            metrics.record_throttle_execution(values::EDGE_TRAILING);
        }
        (self.shared.func)(args);
    }
}
