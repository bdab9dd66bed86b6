#![forbid(unsafe_code)]

pub mod config;
pub mod debounce;
pub mod error;
pub mod rate_limit;
mod scheduler;
pub mod telemetry;
pub mod throttle;

pub use config::{load_from_path, Config, OverflowStrategy};
pub use debounce::{Debounce, DebounceOptions};
pub use error::{CadenceError, RateLimitError, Result};
pub use rate_limit::{RateLimited, RateLimiter};
pub use telemetry::{Metrics, MetricsHandle};
pub use throttle::{Throttle, ThrottleOptions};
