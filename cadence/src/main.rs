#![forbid(unsafe_code)]

use cadence_lib::config::{load_from_path, Config};
use cadence_lib::telemetry::{encode_metrics, init_metrics, init_tracing, Metrics, MetricsHandle};
use cadence_lib::{Debounce, DebounceOptions, RateLimiter, Throttle, ThrottleOptions};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "Replay a call stream against configured call-rate controls")]
struct Cli {
    /// Path to configuration TOML file
    #[arg(short, long, value_name = "FILE", default_value = "demos/config/basic.toml")]
    config: PathBuf,

    /// Number of calls to fire
    #[arg(long, default_value_t = 20)]
    calls: usize,

    /// Spacing between calls in milliseconds
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
    interval_ms: u64,

    /// Print Prometheus metrics after the run
    #[arg(long)]
    metrics: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let cfg = match load_from_path(&cli.config) {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("failed to load configuration: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = init_tracing(&cfg.logging.level, cfg.logging.show_target) {
        eprintln!("failed to initialize tracing: {err}");
    }
    info!(config = %cli.config.display(), calls = cli.calls, interval_ms = cli.interval_ms, "configuration loaded");

    let (metrics, registry) = match init_metrics() {
        Ok(pair) => pair,
        Err(err) => {
            error!(%err, "failed to initialize metrics");
            std::process::exit(1);
        }
    };

    if let Err(err) = replay(&cli, &cfg, metrics).await {
        error!(%err, "replay failed");
        std::process::exit(1);
    }

    if cli.metrics {
        match encode_metrics(&registry) {
            Ok(text) => print!("{text}"),
            Err(err) => warn!(%err, "failed to render metrics"),
        }
    }
}

fn counter() -> (Arc<AtomicUsize>, impl Fn(usize) + Send + Sync + 'static) {
    let executions = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&executions);
    (executions, move |call| {
        counted.fetch_add(1, Ordering::Relaxed);
        debug!(call, "executed");
    })
}

async fn replay(cli: &Cli, cfg: &Config, metrics: Arc<Metrics>) -> cadence_lib::Result<()> {
    let mut settle = Duration::ZERO;

    let throttle = match &cfg.throttle {
        Some(section) => {
            let (executions, func) = counter();
            let options = ThrottleOptions {
                metrics: Some(MetricsHandle::new(metrics.clone(), "throttle")),
                ..ThrottleOptions::from(section)
            };
            settle = settle.max(section.wait());
            Some((Throttle::new(func, section.wait(), options)?, executions))
        }
        None => None,
    };

    let debounce = match &cfg.debounce {
        Some(section) => {
            let (executions, func) = counter();
            let options = DebounceOptions {
                metrics: Some(MetricsHandle::new(metrics.clone(), "debounce")),
                ..DebounceOptions::from(section)
            };
            settle = settle.max(section.wait());
            Some((Debounce::new(func, section.wait(), options)?, executions))
        }
        None => None,
    };

    let limiter = match &cfg.rate_limit {
        Some(section) => Some(RateLimiter::from_config(
            section,
            Some(MetricsHandle::new(metrics, "rate_limit")),
        )?),
        None => None,
    };

    let mut acquisitions = Vec::with_capacity(cli.calls);
    let mut ticker = tokio::time::interval(Duration::from_millis(cli.interval_ms));
    for call in 0..cli.calls {
        ticker.tick().await;
        if let Some((throttle, _)) = &throttle {
            throttle.call(call);
        }
        if let Some((debounce, _)) = &debounce {
            debounce.call(call);
        }
        if let Some(limiter) = &limiter {
            let limiter = limiter.clone();
            acquisitions.push(tokio::spawn(async move { limiter.acquire().await }));
        }
    }

    tokio::time::sleep(settle + Duration::from_millis(cli.interval_ms)).await;

    if let Some((throttle, executions)) = &throttle {
        info!(
            calls = cli.calls,
            executions = executions.load(Ordering::Relaxed),
            wait = ?throttle.wait(),
            "throttle summary"
        );
    }
    if let Some((debounce, executions)) = &debounce {
        info!(
            calls = cli.calls,
            executions = executions.load(Ordering::Relaxed),
            pending = debounce.is_pending(),
            "debounce summary"
        );
    }
    if let Some(limiter) = &limiter {
        let (mut granted, mut refused, mut rejected) = (0usize, 0usize, 0usize);
        for acquisition in acquisitions {
            match acquisition.await {
                Ok(Ok(true)) => granted += 1,
                Ok(Ok(false)) => refused += 1,
                Ok(Err(_)) => rejected += 1,
                Err(err) => warn!(%err, "acquisition task failed"),
            }
        }
        info!(
            strategy = limiter.strategy().as_str(),
            granted,
            refused,
            rejected,
            remaining = limiter.remaining(),
            "rate limit summary"
        );
    }

    Ok(())
}
