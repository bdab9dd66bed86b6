mod loader;
mod types;
mod validator;

pub use loader::{load_from_path, load_from_str};
pub use types::{
    Config, DebounceConfig, LoggingConfig, OverflowStrategy, RateLimitConfig, ThrottleConfig,
};
pub use validator::validate;
