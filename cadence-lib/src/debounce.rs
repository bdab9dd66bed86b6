//! Debouncing: coalesce a burst of calls into a single execution.
//!
//! Every call restarts a quiet-period timer of `wait`; the function runs with the latest
//! arguments once the timer survives. Two optional behaviors layer on top:
//!
//! - **leading**: the first call of a burst runs immediately. The quiet-period fire then only
//!   runs again if more calls arrived after that first one.
//! - **max_wait**: a ceiling timer started by the first call of a burst forces an execution
//!   after `max_wait`, so continuous call pressure cannot defer execution forever.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, trace};

use crate::config::DebounceConfig;
use crate::error::{CadenceError, Result};
use crate::scheduler::{self, lock, Generation, TimerSlot};
use crate::telemetry::metrics::{values, MetricsHandle};

/// Optional behaviors of a [`Debounce`]
#[derive(Debug, Clone, Default)]
pub struct DebounceOptions {
    /// Execute on the first call of a burst
    pub leading: bool,
    /// Force an execution at least this often while a burst keeps going
    pub max_wait: Option<Duration>,
    /// Report calls and executions under this handle's name
    pub metrics: Option<MetricsHandle>,
}

impl From<&DebounceConfig> for DebounceOptions {
    fn from(config: &DebounceConfig) -> Self {
        Self { leading: config.leading, max_wait: config.max_wait(), metrics: None }
    }
}

#[derive(Debug, Clone, Copy)]
enum Trigger {
    Quiet,
    MaxWait,
}

struct DebounceState<A> {
    pending_args: Option<A>,
    pending: bool,
    leading_fired: bool,
    quiet: TimerSlot,
    ceiling: TimerSlot,
}

impl<A> DebounceState<A> {
    /// End the current burst, handing back the arguments still owed an execution.
    fn settle(&mut self) -> Option<A> {
        self.pending = false;
        self.leading_fired = false;
        self.ceiling.cancel();
        self.pending_args.take()
    }
}

struct Shared<A> {
    func: Box<dyn Fn(A) + Send + Sync>,
    wait: Duration,
    leading: bool,
    max_wait: Option<Duration>,
    metrics: Option<MetricsHandle>,
    runtime: Handle,
    state: Mutex<DebounceState<A>>,
}

/// A function wrapped so that bursts of calls collapse into one execution.
///
/// Clones share the same state.
pub struct Debounce<A> {
    shared: Arc<Shared<A>>,
}

impl<A> Clone for Debounce<A> {
    fn clone(&self) -> Self {
        Self { shared: Arc::clone(&self.shared) }
    }
}

impl<A> fmt::Debug for Debounce<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Debounce")
            .field("wait", &self.shared.wait)
            .field("leading", &self.shared.leading)
            .field("max_wait", &self.shared.max_wait)
            .finish_non_exhaustive()
    }
}

impl<A> Debounce<A>
where
    A: Send + 'static,
{
    /// Wrap `func` so it runs once a burst of calls has been quiet for `wait`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new<F>(func: F, wait: Duration, options: DebounceOptions) -> Result<Self>
    where
        F: Fn(A) + Send + Sync + 'static,
    {
        if wait.is_zero() {
            return Err(CadenceError::Config("debounce wait must be > 0".into()));
        }
        if options.max_wait.is_some_and(|max_wait| max_wait.is_zero()) {
            return Err(CadenceError::Config("debounce max_wait must be > 0".into()));
        }
        let runtime = scheduler::runtime()?;
        Ok(Self {
            shared: Arc::new(Shared {
                func: Box::new(func),
                wait,
                leading: options.leading,
                max_wait: options.max_wait,
                metrics: options.metrics,
                runtime,
                state: Mutex::new(DebounceState {
                    pending_args: None,
                    pending: false,
                    leading_fired: false,
                    quiet: TimerSlot::default(),
                    ceiling: TimerSlot::default(),
                }),
            }),
        })
    }

    /// Invoke the debounced function.
    pub fn call(&self, args: A) {
        let shared = &self.shared;
        if let Some(metrics) = &shared.metrics {
            metrics.record_debounce_call();
        }

        let leading_args = {
            let mut state = lock(&shared.state);
            state.pending_args = Some(args);
            state.pending = true;

            let mut leading_args = None;
            if shared.leading && !state.leading_fired {
                state.leading_fired = true;
                leading_args = state.pending_args.take();
            }

            self.arm(&mut state, Trigger::Quiet, shared.wait);
            if let Some(max_wait) = shared.max_wait {
                if !state.ceiling.is_armed() {
                    trace!(?max_wait, "burst started, arming max_wait ceiling");
                    self.arm(&mut state, Trigger::MaxWait, max_wait);
                }
            }
            leading_args
        };

        if let Some(args) = leading_args {
            if let Some(metrics) = &shared.metrics {
                metrics.record_debounce_execution(values::TRIGGER_LEADING);
            }
            (shared.func)(args);
        }
    }

    /// Abandon the current burst without executing.
    pub fn cancel(&self) {
        let mut state = lock(&self.shared.state);
        if state.pending {
            debug!("debounce cancelled with a pending burst");
        }
        state.quiet.cancel();
        state.ceiling.cancel();
        state.pending_args = None;
        state.pending = false;
        state.leading_fired = false;
    }

    /// End the current burst now, executing with the latest arguments if any are owed.
    ///
    /// Returns true when the function ran.
    pub fn flush(&self) -> bool {
        let args = {
            let mut state = lock(&self.shared.state);
            state.quiet.cancel();
            state.settle()
        };
        let Some(args) = args else {
            return false;
        };

        if let Some(metrics) = &self.shared.metrics {
            metrics.record_debounce_execution(values::TRIGGER_FLUSH);
        }
        (self.shared.func)(args);
        true
    }

    /// True from the first call of a burst until it executes or is cancelled.
    pub fn is_pending(&self) -> bool {
        lock(&self.shared.state).pending
    }

    /// Get the quiet period that ends a burst.
    pub fn wait(&self) -> Duration {
        self.shared.wait
    }

    fn arm(&self, state: &mut DebounceState<A>, trigger: Trigger, delay: Duration) {
        let weak = Arc::downgrade(&self.shared);
        let on_fire = move |generation: Generation| {
            if let Some(shared) = weak.upgrade() {
                Debounce { shared }.fire(trigger, generation);
            }
        };
        match trigger {
            Trigger::Quiet => state.quiet.arm(&self.shared.runtime, delay, on_fire),
            Trigger::MaxWait => state.ceiling.arm(&self.shared.runtime, delay, on_fire),
        }
    }

    fn fire(&self, trigger: Trigger, generation: Generation) {
        let args = {
            let mut state = lock(&self.shared.state);
            match trigger {
                Trigger::Quiet => {
                    if !state.quiet.claim(generation) {
                        return;
                    }
                }
                Trigger::MaxWait => {
                    if !state.ceiling.claim(generation) {
                        return;
                    }
                    state.quiet.cancel();
                }
            }
            state.settle()
        };
        // With `leading`, an isolated call was already executed and leaves nothing owed.
        let Some(args) = args else {
            return;
        };

        if let Some(metrics) = &self.shared.metrics {
            let trigger = match trigger {
                Trigger::Quiet => values::TRIGGER_QUIET,
                Trigger::MaxWait => values::TRIGGER_MAX_WAIT,
            };
            metrics.record_debounce_execution(trigger);
        }
        (self.shared.func)(args);
    }
}
