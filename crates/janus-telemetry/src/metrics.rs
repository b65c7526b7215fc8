//! Prometheus metrics for Janus.
//!
//! The recorder is process-wide. Adapters come and go on every framework
//! switch, so installation is idempotent: the second and later calls hand
//! back the handle created by the first.
//!
//! # Standard Metrics
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `janus_requests_total` | Counter | `framework`, `path`, `status` | Total requests |
//! | `janus_request_duration_seconds` | Histogram | `framework`, `path` | Request latency |
//! | `janus_in_flight_requests` | Gauge | `framework` | In-flight requests |
//! | `janus_errors_total` | Counter | `error_type`, `error_message` | Logged application errors |
//! | `janus_framework_switches_total` | Counter | `framework`, `outcome` | Supervisor transitions |
//! | `janus_active_framework` | Gauge | `framework` | 1 for the serving backend |

use std::sync::OnceLock;
use std::time::{Duration, Instant};

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use tokio::task::JoinHandle;

use crate::error::TelemetryError;
use crate::TelemetryResult;

/// Global metrics handle for rendering.
static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Requests served, by framework, path and status.
pub const REQUESTS_TOTAL: &str = "janus_requests_total";
/// Request latency histogram.
pub const REQUEST_DURATION_SECONDS: &str = "janus_request_duration_seconds";
/// Requests currently being processed.
pub const IN_FLIGHT_REQUESTS: &str = "janus_in_flight_requests";
/// Supervisor transitions, by target framework and outcome.
pub const FRAMEWORK_SWITCHES_TOTAL: &str = "janus_framework_switches_total";
/// Info gauge naming the serving backend.
pub const ACTIVE_FRAMEWORK: &str = "janus_active_framework";

const RUNTIME_WORKERS: &str = "janus_runtime_workers";
const RUNTIME_ALIVE_TASKS: &str = "janus_runtime_alive_tasks";
const PROCESS_UPTIME_SECONDS: &str = "janus_process_uptime_seconds";
const PROCESS_ID: &str = "janus_process_id";

/// Metrics configuration.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Whether metrics are enabled.
    pub enabled: bool,

    /// Service name for metric labels.
    pub service_name: String,

    /// Histogram buckets for request duration.
    pub duration_buckets: Vec<f64>,

    /// Publish tokio runtime gauges.
    pub runtime_metrics: bool,

    /// Publish process gauges.
    pub host_metrics: bool,

    /// Period of the runtime/process collector.
    pub collection_interval: Duration,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            service_name: "janus".to_string(),
            duration_buckets: vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ],
            runtime_metrics: false,
            host_metrics: false,
            collection_interval: Duration::from_secs(10),
        }
    }
}

/// Renders the installed recorder in Prometheus text format.
#[derive(Debug, Clone)]
pub struct MetricsRegistry {
    handle: PrometheusHandle,
}

impl MetricsRegistry {
    /// Creates a new metrics registry with the given handle.
    #[must_use]
    pub fn new(handle: PrometheusHandle) -> Self {
        Self { handle }
    }

    /// Renders all metrics in Prometheus text format.
    #[must_use]
    pub fn render(&self) -> String {
        self.handle.render()
    }

    /// Drains histogram buffers. Called periodically by the collector.
    pub fn run_upkeep(&self) {
        self.handle.run_upkeep();
    }
}

/// Installs the Prometheus recorder, or returns the one already installed.
///
/// Returns `Ok(None)` when metrics are disabled.
///
/// # Errors
///
/// Returns `TelemetryError::MetricsInit` if the bucket configuration is
/// rejected.
pub fn init_metrics(config: &MetricsConfig) -> TelemetryResult<Option<MetricsRegistry>> {
    if !config.enabled {
        return Ok(None);
    }

    if let Some(handle) = METRICS_HANDLE.get() {
        return Ok(Some(MetricsRegistry::new(handle.clone())));
    }

    let recorder = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(REQUEST_DURATION_SECONDS.to_string()),
            &config.duration_buckets,
        )
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?
        .build_recorder();
    let handle = recorder.handle();

    match metrics::set_global_recorder(recorder) {
        Ok(()) => {
            register_metric_descriptions();
            tracing::debug!(service = %config.service_name, "Prometheus recorder installed");
        }
        // Another recorder won the race; ours still renders whatever it saw.
        Err(_) => tracing::debug!("Metrics recorder already installed, reusing"),
    }

    let handle = METRICS_HANDLE.get_or_init(|| handle).clone();
    Ok(Some(MetricsRegistry::new(handle)))
}

fn register_metric_descriptions() {
    describe_counter!(REQUESTS_TOTAL, "Total number of HTTP requests processed");
    describe_histogram!(
        REQUEST_DURATION_SECONDS,
        metrics::Unit::Seconds,
        "HTTP request duration in seconds"
    );
    describe_gauge!(
        IN_FLIGHT_REQUESTS,
        "Number of HTTP requests currently being processed"
    );
    describe_counter!(
        janus_core::ERRORS_TOTAL,
        "Total number of application errors by type and message"
    );
    describe_counter!(
        FRAMEWORK_SWITCHES_TOTAL,
        "Framework transitions performed by the supervisor"
    );
    describe_gauge!(ACTIVE_FRAMEWORK, "Set to 1 for the framework currently serving");
    describe_gauge!(RUNTIME_WORKERS, "Number of tokio worker threads");
    describe_gauge!(RUNTIME_ALIVE_TASKS, "Number of alive tokio tasks");
    describe_gauge!(
        PROCESS_UPTIME_SECONDS,
        metrics::Unit::Seconds,
        "Seconds since the process started"
    );
    describe_gauge!(PROCESS_ID, "Operating system process id");
}

/// Records a completed request.
pub fn record_request(framework: &str, path: &str, status_code: u16, duration: Duration) {
    counter!(
        REQUESTS_TOTAL,
        "framework" => framework.to_string(),
        "path" => path.to_string(),
        "status" => status_code.to_string()
    )
    .increment(1);

    histogram!(
        REQUEST_DURATION_SECONDS,
        "framework" => framework.to_string(),
        "path" => path.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Records a supervisor transition to `framework`.
///
/// `outcome` is one of `started`, `failed`, `resumed` or `rejected`.
pub fn record_switch(framework: &str, outcome: &'static str) {
    counter!(
        FRAMEWORK_SWITCHES_TOTAL,
        "framework" => framework.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Marks `framework` as serving (1) or not serving (0).
pub fn set_active_framework(framework: &str, active: bool) {
    gauge!(ACTIVE_FRAMEWORK, "framework" => framework.to_string()).set(if active {
        1.0
    } else {
        0.0
    });
}

/// Guard that tracks one in-flight request for a framework.
///
/// Decrements the gauge on drop, including when the handler panics.
pub struct InFlightGuard {
    framework: String,
}

impl InFlightGuard {
    /// Creates a new guard and increments the in-flight gauge.
    #[must_use]
    pub fn new(framework: &str) -> Self {
        gauge!(IN_FLIGHT_REQUESTS, "framework" => framework.to_string()).increment(1.0);
        Self {
            framework: framework.to_string(),
        }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        gauge!(IN_FLIGHT_REQUESTS, "framework" => self.framework.clone()).decrement(1.0);
    }
}

/// Spawns the periodic runtime/process collector.
///
/// Returns `None` when neither runtime nor host metrics are enabled. The
/// task runs until aborted.
#[must_use]
pub fn spawn_collector(
    config: &MetricsConfig,
    registry: Option<MetricsRegistry>,
) -> Option<JoinHandle<()>> {
    if !config.runtime_metrics && !config.host_metrics {
        return None;
    }

    let runtime = config.runtime_metrics;
    let host = config.host_metrics;
    let period = config.collection_interval;
    let started = Instant::now();

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;

            if runtime {
                let metrics = tokio::runtime::Handle::current().metrics();
                gauge!(RUNTIME_WORKERS).set(metrics.num_workers() as f64);
                gauge!(RUNTIME_ALIVE_TASKS).set(metrics.num_alive_tasks() as f64);
            }

            if host {
                gauge!(PROCESS_UPTIME_SECONDS).set(started.elapsed().as_secs_f64());
                gauge!(PROCESS_ID).set(f64::from(std::process::id()));
            }

            if let Some(registry) = &registry {
                registry.run_upkeep();
            }
        }
    }))
}
