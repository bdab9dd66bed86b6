use std::future::Future;

use crate::error::RateLimitError;
use crate::rate_limit::RateLimiter;

/// An async function guarded by a [`RateLimiter`], built by [`RateLimiter::wrap`].
#[derive(Debug, Clone)]
pub struct RateLimited<F> {
    limiter: RateLimiter,
    func: F,
}

impl<F> RateLimited<F> {
    pub(crate) fn new(limiter: RateLimiter, func: F) -> Self {
        Self { limiter, func }
    }

    /// Acquire a slot, then run the function with `args`.
    ///
    /// A refused acquisition fails with [`RateLimitError`] whatever the strategy. The function's
    /// own output, including any error it returns, is passed through untouched.
    pub async fn call<A, Fut>(&self, args: A) -> Result<Fut::Output, RateLimitError>
    where
        F: Fn(A) -> Fut,
        Fut: Future,
    {
        if !self.limiter.acquire().await? {
            return Err(self.limiter.error());
        }
        Ok((self.func)(args).await)
    }

    /// Get the limiter guarding the function.
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }
}
