//! Deferred-callback plumbing shared by every primitive.
//!
//! Each throttle, debounce and rate limiter owns one or more [`TimerSlot`]s. A slot holds at
//! most one armed timer, realized as a tokio task that sleeps and then invokes a callback. Every
//! arming bumps a generation counter; the callback must [`TimerSlot::claim`] its generation
//! under the owner's lock before acting, so a timer that was cancelled or replaced after its
//! task already woke turns into a no-op.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::error::{CadenceError, Result};

/// Tag identifying one arming of a [`TimerSlot`].
pub(crate) type Generation = u64;

struct Armed {
    generation: Generation,
    task: JoinHandle<()>,
}

#[derive(Default)]
pub(crate) struct TimerSlot {
    generation: Generation,
    armed: Option<Armed>,
}

impl TimerSlot {
    pub(crate) fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    /// Arm the slot so that `on_fire` runs after `delay`, replacing any timer already armed.
    pub(crate) fn arm<F>(&mut self, runtime: &Handle, delay: Duration, on_fire: F)
    where
        F: FnOnce(Generation) + Send + 'static,
    {
        self.cancel();
        self.generation = self.generation.wrapping_add(1);
        let generation = self.generation;
        let task = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            on_fire(generation);
        });
        self.armed = Some(Armed { generation, task });
    }

    /// Disarm without firing.
    pub(crate) fn cancel(&mut self) {
        if let Some(armed) = self.armed.take() {
            armed.task.abort();
        }
    }

    /// Disarm the slot on behalf of the timer tagged `generation`.
    ///
    /// Returns false when that timer has since been cancelled or replaced, in which case the
    /// caller must not act.
    pub(crate) fn claim(&mut self, generation: Generation) -> bool {
        match &self.armed {
            Some(armed) if armed.generation == generation => {
                self.armed = None;
                true
            }
            _ => false,
        }
    }
}

impl Drop for TimerSlot {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Handle of the tokio runtime the caller is running on.
pub(crate) fn runtime() -> Result<Handle> {
    Handle::try_current().map_err(|e| {
        CadenceError::Config(format!("a tokio runtime is required to schedule timers: {e}"))
    })
}

/// Lock `state`, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(state: &Mutex<T>) -> MutexGuard<'_, T> {
    match state.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("state lock poisoned, recovering");
            poisoned.into_inner()
        }
    }
}
