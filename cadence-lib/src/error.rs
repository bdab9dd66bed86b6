use std::time::Duration;
use thiserror::Error;

/// Raised when a rate limiter has no free slot and the caller may not wait for one.
///
/// Carries the limiter's configuration so callers can report or derive a backoff.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("rate limit exceeded: {limit} calls per {window:?}")]
pub struct RateLimitError {
    limit: usize,
    window: Duration,
}

impl RateLimitError {
    pub fn new(limit: usize, window: Duration) -> Self {
        Self { limit, window }
    }

    /// Maximum number of acquisitions allowed per window.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Length of the sliding window.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Human readable description, identical to the `Display` output.
    pub fn message(&self) -> String {
        self.to_string()
    }
}

/// Errors that can occur while building or driving call-rate primitives
#[derive(Error, Debug)]
pub enum CadenceError {
    #[error(transparent)]
    RateLimited(#[from] RateLimitError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Metrics error: {0}")]
    Metrics(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CadenceError>;
