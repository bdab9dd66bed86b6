use serde::Deserialize;
use std::time::Duration;

/// Root configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Throttle settings, if a throttle should be built
    #[serde(default)]
    pub throttle: Option<ThrottleConfig>,
    /// Debounce settings, if a debounce should be built
    #[serde(default)]
    pub debounce: Option<DebounceConfig>,
    /// Rate limiter settings, if a rate limiter should be built
    #[serde(default)]
    pub rate_limit: Option<RateLimitConfig>,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    /// Default: "info"
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Show module path (target) in log messages
    /// Default: false
    #[serde(default)]
    pub show_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level(), show_target: false }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Throttle configuration
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ThrottleConfig {
    /// Minimum spacing between executions in milliseconds
    pub wait_ms: u64,
    /// Execute on the leading edge of a window
    /// Default: true
    #[serde(default = "default_true")]
    pub leading: bool,
    /// Execute on the trailing edge with the latest arguments
    /// Default: true
    #[serde(default = "default_true")]
    pub trailing: bool,
}

impl ThrottleConfig {
    pub fn wait(&self) -> Duration {
        Duration::from_millis(self.wait_ms)
    }
}

/// Debounce configuration
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct DebounceConfig {
    /// Quiet period in milliseconds
    pub wait_ms: u64,
    /// Execute on the first call of a burst
    /// Default: false
    #[serde(default)]
    pub leading: bool,
    /// Upper bound on how long a burst may defer execution, in milliseconds
    /// Default: none (unbounded)
    #[serde(default)]
    pub max_wait_ms: Option<u64>,
}

impl DebounceConfig {
    pub fn wait(&self) -> Duration {
        Duration::from_millis(self.wait_ms)
    }

    pub fn max_wait(&self) -> Option<Duration> {
        self.max_wait_ms.map(Duration::from_millis)
    }
}

/// Sliding-window rate limiting configuration
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Maximum acquisitions within one window
    pub limit: usize,
    /// Window length in milliseconds
    pub window_ms: u64,
    /// What to do when no slot is free
    /// Default: "drop"
    #[serde(default)]
    pub strategy: OverflowStrategy,
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

/// Behavior of `acquire` when the window is full
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OverflowStrategy {
    /// Resolve immediately with `false`
    #[default]
    Drop,
    /// Park the caller in a FIFO queue until a slot frees up
    Queue,
    /// Fail immediately with a `RateLimitError`
    Error,
}

impl OverflowStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverflowStrategy::Drop => "drop",
            OverflowStrategy::Queue => "queue",
            OverflowStrategy::Error => "error",
        }
    }
}

fn default_true() -> bool {
    true
}
