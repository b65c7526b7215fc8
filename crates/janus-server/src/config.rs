//! Options shared by every adapter.
//!
//! [`FrameworkOptions`] is built once at startup and shared behind an `Arc`
//! by the active adapter and every adapter created by later switches. Only
//! the log level inside it ever changes.
//!
//! # Example
//!
//! ```rust
//! use janus_server::FrameworkOptions;
//! use std::time::Duration;
//!
//! let options = FrameworkOptions::builder()
//!     .listen_addr("127.0.0.1:8080")
//!     .shutdown_timeout(Duration::from_secs(10))
//!     .build();
//!
//! assert_eq!(options.listen_addr(), "127.0.0.1:8080");
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use janus_core::LogLevelControl;
use janus_telemetry::MetricsRegistry;
use opentelemetry::global::BoxedTracer;
use opentelemetry_sdk::trace::TracerProvider;

/// Default listen address.
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:3000";

/// Default per-stop grace period in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 5;

/// Configuration handed to every adapter.
#[derive(Clone)]
pub struct FrameworkOptions {
    listen_addr: String,
    tracing_enabled: bool,
    dashboard_enabled: bool,
    log_level: LogLevelControl,
    tracer: Option<Arc<BoxedTracer>>,
    tracer_provider: Option<TracerProvider>,
    metrics: Option<MetricsRegistry>,
    shutdown_timeout: Duration,
    service_name: String,
    started_at: Instant,
}

impl FrameworkOptions {
    /// Creates a new options builder.
    #[must_use]
    pub fn builder() -> FrameworkOptionsBuilder {
        FrameworkOptionsBuilder::default()
    }

    /// Address adapters bind.
    #[must_use]
    pub fn listen_addr(&self) -> &str {
        &self.listen_addr
    }

    /// Whether adapters open a server span per request.
    ///
    /// True only when tracing was requested and a tracer is present.
    #[must_use]
    pub fn tracing_enabled(&self) -> bool {
        self.tracing_enabled && self.tracer.is_some()
    }

    /// Whether `GET /debug/dashboard` is served.
    #[must_use]
    pub fn dashboard_enabled(&self) -> bool {
        self.dashboard_enabled
    }

    /// Shared log-level control.
    #[must_use]
    pub fn log_level(&self) -> &LogLevelControl {
        &self.log_level
    }

    /// Tracer used for request spans.
    #[must_use]
    pub fn tracer(&self) -> Option<&BoxedTracer> {
        self.tracer.as_deref()
    }

    /// Trace provider, if tracing is enabled.
    #[must_use]
    pub fn tracer_provider(&self) -> Option<&TracerProvider> {
        self.tracer_provider.as_ref()
    }

    /// Prometheus renderer served on `/metrics`.
    #[must_use]
    pub fn metrics(&self) -> Option<&MetricsRegistry> {
        self.metrics.as_ref()
    }

    /// Grace period for each adapter `stop`.
    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }

    /// Service name reported in logs and the dashboard.
    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Time since these options were built.
    #[must_use]
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}

impl Default for FrameworkOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl fmt::Debug for FrameworkOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameworkOptions")
            .field("listen_addr", &self.listen_addr)
            .field("tracing_enabled", &self.tracing_enabled)
            .field("dashboard_enabled", &self.dashboard_enabled)
            .field("log_level", &self.log_level.level())
            .field("tracer", &self.tracer.is_some())
            .field("metrics", &self.metrics.is_some())
            .field("shutdown_timeout", &self.shutdown_timeout)
            .field("service_name", &self.service_name)
            .finish_non_exhaustive()
    }
}

/// Builder for [`FrameworkOptions`].
#[derive(Default)]
pub struct FrameworkOptionsBuilder {
    listen_addr: Option<String>,
    tracing_enabled: bool,
    dashboard_enabled: bool,
    log_level: Option<LogLevelControl>,
    tracer: Option<Arc<BoxedTracer>>,
    tracer_provider: Option<TracerProvider>,
    metrics: Option<MetricsRegistry>,
    shutdown_timeout: Option<Duration>,
    service_name: Option<String>,
}

impl FrameworkOptionsBuilder {
    /// Sets the listen address.
    #[must_use]
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.listen_addr = Some(addr.into());
        self
    }

    /// Enables per-request server spans.
    #[must_use]
    pub fn tracing_enabled(mut self, enabled: bool) -> Self {
        self.tracing_enabled = enabled;
        self
    }

    /// Enables `GET /debug/dashboard`.
    #[must_use]
    pub fn dashboard_enabled(mut self, enabled: bool) -> Self {
        self.dashboard_enabled = enabled;
        self
    }

    /// Shares an existing log-level control.
    #[must_use]
    pub fn log_level(mut self, control: LogLevelControl) -> Self {
        self.log_level = Some(control);
        self
    }

    /// Sets the tracer used for request spans.
    #[must_use]
    pub fn tracer(mut self, tracer: BoxedTracer) -> Self {
        self.tracer = Some(Arc::new(tracer));
        self
    }

    /// Sets the trace provider.
    #[must_use]
    pub fn tracer_provider(mut self, provider: TracerProvider) -> Self {
        self.tracer_provider = Some(provider);
        self
    }

    /// Sets the metrics renderer.
    #[must_use]
    pub fn metrics(mut self, metrics: MetricsRegistry) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Sets the per-stop grace period.
    #[must_use]
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = Some(timeout);
        self
    }

    /// Sets the service name.
    #[must_use]
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = Some(name.into());
        self
    }

    /// Builds the options.
    #[must_use]
    pub fn build(self) -> FrameworkOptions {
        FrameworkOptions {
            listen_addr: self
                .listen_addr
                .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string()),
            tracing_enabled: self.tracing_enabled,
            dashboard_enabled: self.dashboard_enabled,
            log_level: self.log_level.unwrap_or_default(),
            tracer: self.tracer,
            tracer_provider: self.tracer_provider,
            metrics: self.metrics,
            shutdown_timeout: self
                .shutdown_timeout
                .unwrap_or(Duration::from_secs(DEFAULT_SHUTDOWN_TIMEOUT_SECS)),
            service_name: self.service_name.unwrap_or_else(|| "janus".to_string()),
            started_at: Instant::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use janus_core::LogLevel;

    #[test]
    fn test_defaults() {
        let options = FrameworkOptions::default();
        assert_eq!(options.listen_addr(), DEFAULT_LISTEN_ADDR);
        assert_eq!(options.shutdown_timeout(), Duration::from_secs(5));
        assert!(!options.dashboard_enabled());
        assert!(!options.tracing_enabled());
        assert!(options.metrics().is_none());
        assert_eq!(options.log_level().level(), LogLevel::Info);
        assert_eq!(options.service_name(), "janus");
    }

    #[test]
    fn test_tracing_requires_tracer() {
        let options = FrameworkOptions::builder().tracing_enabled(true).build();
        assert!(!options.tracing_enabled());

        let options = FrameworkOptions::builder()
            .tracing_enabled(true)
            .tracer(opentelemetry::global::tracer("test"))
            .build();
        assert!(options.tracing_enabled());
    }

    #[test]
    fn test_log_level_is_shared() {
        let control = LogLevelControl::new(LogLevel::Warn);
        let options = FrameworkOptions::builder()
            .log_level(control.clone())
            .build();

        let clone = options.clone();
        clone.log_level().set(LogLevel::Debug);

        assert_eq!(control.level(), LogLevel::Debug);
        assert_eq!(options.log_level().level(), LogLevel::Debug);
    }

    #[test]
    fn test_debug_hides_handles() {
        let rendered = format!("{:?}", FrameworkOptions::default());
        assert!(rendered.contains("listen_addr"));
        assert!(rendered.contains("tracer: false"));
    }
}
