//! The window module defines [SlidingWindow], the log of consumed slots behind a
//! [RateLimiter](super::RateLimiter).

use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// Acquisition instants over a rolling window.
///
/// # Algorithm
///
/// Sliding log: one timestamp per consumed slot, kept oldest first. A slot expires once a full
/// `window` has passed since it was taken; expired slots are purged lazily at the top of every
/// query, so no timer drives rollover. After a purge the log never holds more than `limit`
/// entries and its front is the next slot to free up.
#[derive(Debug)]
pub(crate) struct SlidingWindow {
    limit: usize,
    window: Duration,
    timestamps: VecDeque<Instant>,
}

impl SlidingWindow {
    pub(crate) fn new(limit: usize, window: Duration) -> Self {
        Self { limit, window, timestamps: VecDeque::with_capacity(limit) }
    }

    fn cleanup(&mut self, now: Instant) {
        while let Some(&oldest) = self.timestamps.front() {
            if now.saturating_duration_since(oldest) < self.window {
                break;
            }
            self.timestamps.pop_front();
        }
    }

    /// Consume a slot at `now` if one is free.
    pub(crate) fn try_acquire(&mut self, now: Instant) -> bool {
        self.cleanup(now);
        if self.timestamps.len() < self.limit {
            self.timestamps.push_back(now);
            true
        } else {
            false
        }
    }

    pub(crate) fn remaining(&mut self, now: Instant) -> usize {
        self.cleanup(now);
        self.limit.saturating_sub(self.timestamps.len())
    }

    /// Time until the oldest consumed slot expires, zero if a slot is free already.
    pub(crate) fn retry_after(&mut self, now: Instant) -> Duration {
        self.cleanup(now);
        if self.timestamps.len() < self.limit {
            return Duration::ZERO;
        }
        self.timestamps
            .front()
            .map(|&oldest| (oldest + self.window).saturating_duration_since(now))
            .unwrap_or(Duration::ZERO)
    }

    pub(crate) fn clear(&mut self) {
        self.timestamps.clear();
    }
}
