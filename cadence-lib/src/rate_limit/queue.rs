use std::collections::VecDeque;
use tokio::sync::oneshot;

/// FIFO of callers parked by the queue overflow strategy.
///
/// Each waiter is the sending half of a oneshot channel; the caller awaits the receiving half.
/// A waiter whose receiver is gone (the `acquire` future was dropped) is skipped.
#[derive(Debug, Default)]
pub(crate) struct WaitQueue {
    waiters: VecDeque<oneshot::Sender<bool>>,
}

impl WaitQueue {
    pub(crate) fn push(&mut self) -> oneshot::Receiver<bool> {
        let (tx, rx) = oneshot::channel();
        self.waiters.push_back(tx);
        rx
    }

    pub(crate) fn len(&self) -> usize {
        self.waiters.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }

    /// Grant the oldest waiter, returning false if it was abandoned or the queue is empty.
    pub(crate) fn grant_front(&mut self) -> bool {
        match self.waiters.pop_front() {
            Some(waiter) => waiter.send(true).is_ok(),
            None => false,
        }
    }

    /// Grant every waiter and empty the queue, returning how many were still listening.
    pub(crate) fn grant_all(&mut self) -> usize {
        self.waiters
            .drain(..)
            .filter_map(|waiter| waiter.send(true).ok())
            .count()
    }
}
