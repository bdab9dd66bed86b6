pub mod metrics;
pub mod tracing;

pub use metrics::{encode_metrics, init_metrics, Metrics, MetricsHandle};
pub use tracing::init_tracing;
