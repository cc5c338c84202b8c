//! Scheduler metrics
//!
//! Recorded through the `metrics` facade; nothing is exported unless a
//! recorder is installed. The `prometheus` feature adds [`init_metrics`],
//! which serves the Prometheus text format over HTTP.
//!
//! All names follow `shardq_scheduler_{name}_{unit}`.

#[cfg(feature = "prometheus")]
use std::sync::OnceLock;
use std::time::{Duration, Instant};

#[cfg(feature = "prometheus")]
static METRICS_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Start the Prometheus exporter on `addr` (idempotent)
#[cfg(feature = "prometheus")]
pub fn init_metrics(
    addr: std::net::SocketAddr,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut result = Ok(());
    METRICS_INITIALIZED.get_or_init(|| {
        match metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
        {
            Ok(()) => tracing::info!("Prometheus metrics listening on http://{}/metrics", addr),
            Err(e) => result = Err(e.into()),
        }
    });
    result
}

/// No-op without the `prometheus` feature
#[cfg(not(feature = "prometheus"))]
pub fn init_metrics(
    _addr: std::net::SocketAddr,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    Ok(())
}

/// Scheduler metrics
pub struct SchedulerMetrics;

impl SchedulerMetrics {
    /// Task routed to a worker queue
    pub fn increment_tasks_dispatched(worker: usize) {
        metrics::counter!("shardq_scheduler_tasks_dispatched_total", "worker" => worker.to_string())
            .increment(1);
    }

    /// Sub-window query completed
    pub fn increment_queries_executed(worker: usize) {
        metrics::counter!("shardq_scheduler_queries_executed_total", "worker" => worker.to_string())
            .increment(1);
    }

    /// Sub-window query failed
    pub fn increment_queries_failed(category: &str) {
        metrics::counter!("shardq_scheduler_queries_failed_total", "category" => category.to_string())
            .increment(1);
    }

    /// Tasks dropped unprocessed
    pub fn add_tasks_abandoned(count: u64) {
        metrics::counter!("shardq_scheduler_tasks_abandoned_total").increment(count);
    }

    /// Worker stopped on a fatal error
    pub fn increment_worker_failures() {
        metrics::counter!("shardq_scheduler_worker_failures_total").increment(1);
    }

    /// Workers currently holding a session
    pub fn set_active_workers(count: usize) {
        metrics::gauge!("shardq_scheduler_active_workers").set(count as f64);
    }

    /// Distinct hosts in the current run
    pub fn set_hosts(count: usize) {
        metrics::gauge!("shardq_scheduler_hosts").set(count as f64);
    }

    /// Query latency
    pub fn record_query_latency(latency: Duration) {
        metrics::histogram!("shardq_scheduler_query_latency_seconds").record(latency.as_secs_f64());
    }

    /// Wall-clock duration of a whole run
    pub fn record_run_duration(elapsed: Duration) {
        metrics::histogram!("shardq_scheduler_run_duration_seconds").record(elapsed.as_secs_f64());
    }
}

/// Monotonic stopwatch
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Start timing now
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Time since start
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
