use opentelemetry::global;
use opentelemetry::metrics::{Counter, Gauge, Meter};
use opentelemetry::KeyValue;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use prometheus::{Encoder, Registry, TextEncoder};
use std::fmt;
use std::sync::Arc;

use crate::config::OverflowStrategy;
use crate::error::{CadenceError, Result};

pub mod labels {
    pub const NAME: &str = "name";
    pub const EDGE: &str = "edge";
    pub const TRIGGER: &str = "trigger";
    pub const STRATEGY: &str = "strategy";
    pub const VERSION: &str = "version";
}

pub mod values {
    pub const EDGE_LEADING: &str = "leading";
    pub const EDGE_TRAILING: &str = "trailing";
    pub const EDGE_FLUSH: &str = "flush";
    pub const TRIGGER_LEADING: &str = "leading";
    pub const TRIGGER_QUIET: &str = "quiet";
    pub const TRIGGER_MAX_WAIT: &str = "max_wait";
    pub const TRIGGER_FLUSH: &str = "flush";
}

#[derive(Clone)]
pub struct Metrics {
    // Throttle metrics
    pub throttle_calls_total: Counter<u64>,
    pub throttle_executions_total: Counter<u64>,

    // Debounce metrics
    pub debounce_calls_total: Counter<u64>,
    pub debounce_executions_total: Counter<u64>,

    // Rate limiting metrics
    pub rate_limit_requests_total: Counter<u64>,
    pub rate_limit_allowed_total: Counter<u64>,
    pub rate_limit_rejected_total: Counter<u64>,
    pub rate_limit_queued_total: Counter<u64>,

    // Build info
    pub build_info: Gauge<u64>,
}

impl Metrics {
    pub fn new(meter: Meter) -> Self {
        Self {
            throttle_calls_total: meter
                .u64_counter("cadence_throttle_calls_total")
                .with_description("Total number of calls made to throttled functions")
                .build(),
            throttle_executions_total: meter
                .u64_counter("cadence_throttle_executions_total")
                .with_description("Total number of throttled function executions by edge")
                .build(),

            debounce_calls_total: meter
                .u64_counter("cadence_debounce_calls_total")
                .with_description("Total number of calls made to debounced functions")
                .build(),
            debounce_executions_total: meter
                .u64_counter("cadence_debounce_executions_total")
                .with_description("Total number of debounced function executions by trigger")
                .build(),

            rate_limit_requests_total: meter
                .u64_counter("cadence_rate_limit_requests_total")
                .with_description("Total number of rate limit acquisition attempts")
                .build(),
            rate_limit_allowed_total: meter
                .u64_counter("cadence_rate_limit_allowed_total")
                .with_description("Total number of acquisitions granted a slot")
                .build(),
            rate_limit_rejected_total: meter
                .u64_counter("cadence_rate_limit_rejected_total")
                .with_description("Total number of acquisitions refused or failed")
                .build(),
            rate_limit_queued_total: meter
                .u64_counter("cadence_rate_limit_queued_total")
                .with_description("Total number of acquisitions parked in the wait queue")
                .build(),

            build_info: meter
                .u64_gauge("cadence_build_info")
                .with_description("Build information")
                .build(),
        }
    }

    pub fn set_build_info(&self) {
        self.build_info
            .record(1, &[KeyValue::new(labels::VERSION, env!("CARGO_PKG_VERSION"))]);
    }
}

/// A [`Metrics`] instance bound to the name of the primitive it reports for.
#[derive(Clone)]
pub struct MetricsHandle {
    metrics: Arc<Metrics>,
    name: String,
}

impl fmt::Debug for MetricsHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricsHandle")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl MetricsHandle {
    pub fn new(metrics: Arc<Metrics>, name: impl Into<String>) -> Self {
        Self { metrics, name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn name_label(&self) -> KeyValue {
        KeyValue::new(labels::NAME, self.name.clone())
    }

    pub fn record_throttle_call(&self) {
        self.metrics.throttle_calls_total.add(1, &[self.name_label()]);
    }

    pub fn record_throttle_execution(&self, edge: &'static str) {
        self.metrics
            .throttle_executions_total
            .add(1, &[self.name_label(), KeyValue::new(labels::EDGE, edge)]);
    }

    pub fn record_debounce_call(&self) {
        self.metrics.debounce_calls_total.add(1, &[self.name_label()]);
    }

    pub fn record_debounce_execution(&self, trigger: &'static str) {
        self.metrics
            .debounce_executions_total
            .add(1, &[self.name_label(), KeyValue::new(labels::TRIGGER, trigger)]);
    }

    pub fn record_rate_limit_request(&self) {
        self.metrics.rate_limit_requests_total.add(1, &[self.name_label()]);
    }

    pub fn record_rate_limit_allowed(&self, granted: u64) {
        self.metrics.rate_limit_allowed_total.add(granted, &[self.name_label()]);
    }

    pub fn record_rate_limit_rejected(&self, strategy: OverflowStrategy) {
        self.metrics.rate_limit_rejected_total.add(
            1,
            &[self.name_label(), KeyValue::new(labels::STRATEGY, strategy.as_str())],
        );
    }

    pub fn record_rate_limit_queued(&self) {
        self.metrics.rate_limit_queued_total.add(1, &[self.name_label()]);
    }
}

pub fn init_metrics() -> std::result::Result<(Arc<Metrics>, Registry), Box<dyn std::error::Error + Send + Sync>>
{
    let registry = Registry::default();

    let exporter = opentelemetry_prometheus::exporter()
        .with_registry(registry.clone())
        .build()?;

    let meter_provider = SdkMeterProvider::builder().with_reader(exporter).build();

    global::set_meter_provider(meter_provider);

    let meter = global::meter("cadence");
    let metrics = Arc::new(Metrics::new(meter));

    metrics.set_build_info();

    Ok((metrics, registry))
}

/// Render everything gathered by `registry` in the Prometheus text exposition format.
pub fn encode_metrics(registry: &Registry) -> Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();
    let mut buffer = Vec::new();

    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| CadenceError::Metrics(format!("Failed to encode metrics: {e}")))?;

    String::from_utf8(buffer)
        .map_err(|e| CadenceError::Metrics(format!("Metrics output is not UTF-8: {e}")))
}
