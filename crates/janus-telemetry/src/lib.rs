//! Observability for Janus.
//!
//! - **Logging**: `tracing-subscriber` with a level filter driven by the
//!   shared [`LogLevelControl`](janus_core::LogLevelControl)
//! - **Metrics**: Prometheus text exposition via the `metrics` crate
//! - **Tracing**: OpenTelemetry spans exported over OTLP
//!
//! # Example
//!
//! ```rust,ignore
//! use janus_core::LogLevelControl;
//! use janus_telemetry::{TelemetryConfig, init_telemetry};
//!
//! let control = LogLevelControl::default();
//! let config = TelemetryConfig::builder().service_name("janus").build();
//! let telemetry = init_telemetry(&config, &control)?;
//!
//! if let Some(metrics) = &telemetry.metrics {
//!     println!("{}", metrics.render());
//! }
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod tracing;

use janus_core::LogLevelControl;
use opentelemetry_sdk::trace::TracerProvider;
use tokio::task::JoinHandle;

pub use config::{TelemetryConfig, TelemetryConfigBuilder};
pub use error::TelemetryError;
pub use logging::{init_logging, LogConfig, LogFormat};
pub use metrics::{init_metrics, MetricsConfig, MetricsRegistry};
pub use tracing::{init_tracing, ServerSpan, TracingConfig};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Everything [`init_telemetry`] set up.
///
/// Keep it alive for the lifetime of the application. Dropping it flushes
/// pending spans and stops the metrics collector.
pub struct TelemetryGuard {
    /// Metrics renderer, if metrics are enabled.
    pub metrics: Option<MetricsRegistry>,
    tracer_provider: Option<TracerProvider>,
    collector: Option<JoinHandle<()>>,
}

impl TelemetryGuard {
    /// Creates a new telemetry guard.
    #[must_use]
    pub fn new(
        metrics: Option<MetricsRegistry>,
        tracer_provider: Option<TracerProvider>,
        collector: Option<JoinHandle<()>>,
    ) -> Self {
        Self {
            metrics,
            tracer_provider,
            collector,
        }
    }

    /// Returns the tracer provider, if tracing is enabled.
    #[must_use]
    pub fn tracer_provider(&self) -> Option<&TracerProvider> {
        self.tracer_provider.as_ref()
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(collector) = self.collector.take() {
            collector.abort();
        }
        if let Some(provider) = self.tracer_provider.take() {
            for result in provider.force_flush() {
                if let Err(e) = result {
                    eprintln!("Error flushing tracer provider: {e}");
                }
            }
            if let Err(e) = provider.shutdown() {
                eprintln!("Error shutting down tracer provider: {e}");
            }
        }
    }
}

/// Initializes logging, metrics and tracing, in that order.
///
/// Must be called from within a tokio runtime when tracing or the
/// runtime/host collector is enabled.
///
/// # Errors
///
/// Returns `TelemetryError` if any subsystem fails to initialize.
pub fn init_telemetry(
    config: &TelemetryConfig,
    control: &LogLevelControl,
) -> TelemetryResult<TelemetryGuard> {
    init_logging(&config.logging, control)?;

    let metrics = init_metrics(&config.metrics)?;
    let collector = metrics::spawn_collector(&config.metrics, metrics.clone());

    let tracer_provider = init_tracing(&config.tracing)?;

    Ok(TelemetryGuard::new(metrics, tracer_provider, collector))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_telemetry_guard_creation() {
        let guard = TelemetryGuard::new(None, None, None);
        assert!(guard.tracer_provider().is_none());
        drop(guard);
    }

    #[tokio::test]
    async fn test_guard_aborts_collector() {
        let collector = tokio::spawn(std::future::pending::<()>());
        let abort = collector.abort_handle();

        drop(TelemetryGuard::new(None, None, Some(collector)));

        tokio::time::timeout(std::time::Duration::from_secs(1), async {
            while !abort.is_finished() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("collector should be aborted");
    }
}
