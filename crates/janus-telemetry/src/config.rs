//! Telemetry configuration.

use crate::logging::{LogConfig, LogFormat};
use crate::metrics::MetricsConfig;
use crate::tracing::TracingConfig;

/// Configuration for all telemetry subsystems.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name (used in metrics, traces, and logs).
    pub service_name: String,

    /// Service version.
    pub service_version: String,

    /// Metrics configuration.
    pub metrics: MetricsConfig,

    /// Tracing configuration.
    pub tracing: TracingConfig,

    /// Logging configuration.
    pub logging: LogConfig,
}

impl TelemetryConfig {
    /// Creates a new configuration builder.
    #[must_use]
    pub fn builder() -> TelemetryConfigBuilder {
        TelemetryConfigBuilder::new()
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "janus".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            metrics: MetricsConfig::default(),
            tracing: TracingConfig::default(),
            logging: LogConfig::default(),
        }
    }
}

/// Builder for [`TelemetryConfig`].
#[derive(Debug, Default)]
pub struct TelemetryConfigBuilder {
    service_name: Option<String>,
    service_version: Option<String>,
    log_format: Option<LogFormat>,
    tracing_enabled: Option<bool>,
    otlp_endpoint: Option<String>,
    runtime_metrics: Option<bool>,
    host_metrics: Option<bool>,
}

impl TelemetryConfigBuilder {
    /// Creates a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the service name.
    #[must_use]
    pub fn service_name(mut self, name: &str) -> Self {
        self.service_name = Some(name.to_string());
        self
    }

    /// Sets the service version.
    #[must_use]
    pub fn service_version(mut self, version: &str) -> Self {
        self.service_version = Some(version.to_string());
        self
    }

    /// Sets the log output format.
    #[must_use]
    pub fn log_format(mut self, format: LogFormat) -> Self {
        self.log_format = Some(format);
        self
    }

    /// Enables or disables OTLP tracing.
    #[must_use]
    pub fn tracing_enabled(mut self, enabled: bool) -> Self {
        self.tracing_enabled = Some(enabled);
        self
    }

    /// Sets the OTLP endpoint and enables tracing.
    #[must_use]
    pub fn otlp_endpoint(mut self, endpoint: &str) -> Self {
        self.otlp_endpoint = Some(endpoint.to_string());
        self.tracing_enabled = Some(true);
        self
    }

    /// Enables or disables the tokio runtime gauges.
    #[must_use]
    pub fn runtime_metrics(mut self, enabled: bool) -> Self {
        self.runtime_metrics = Some(enabled);
        self
    }

    /// Enables or disables the process gauges.
    #[must_use]
    pub fn host_metrics(mut self, enabled: bool) -> Self {
        self.host_metrics = Some(enabled);
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> TelemetryConfig {
        let defaults = TelemetryConfig::default();

        let service_name = self.service_name.unwrap_or(defaults.service_name);
        let service_version = self.service_version.unwrap_or(defaults.service_version);

        let metrics = MetricsConfig {
            service_name: service_name.clone(),
            runtime_metrics: self
                .runtime_metrics
                .unwrap_or(defaults.metrics.runtime_metrics),
            host_metrics: self.host_metrics.unwrap_or(defaults.metrics.host_metrics),
            ..defaults.metrics
        };

        let tracing = TracingConfig {
            enabled: self.tracing_enabled.unwrap_or(defaults.tracing.enabled),
            otlp_endpoint: self
                .otlp_endpoint
                .unwrap_or(defaults.tracing.otlp_endpoint),
            service_name: service_name.clone(),
            service_version: service_version.clone(),
            ..defaults.tracing
        };

        let logging = LogConfig {
            format: self.log_format.unwrap_or(defaults.logging.format),
            service_name: service_name.clone(),
            ..defaults.logging
        };

        TelemetryConfig {
            service_name,
            service_version,
            metrics,
            tracing,
            logging,
        }
    }
}
