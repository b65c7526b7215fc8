//! Command-line arguments.
//!
//! Every flag falls back to an environment variable, so the service can be
//! configured entirely from its container environment.

use std::time::Duration;

use clap::Parser;
use janus_core::{LogLevel, LogLevelControl};
use janus_server::config::{DEFAULT_LISTEN_ADDR, DEFAULT_SHUTDOWN_TIMEOUT_SECS};
use janus_server::{FailurePolicy, FrameworkOptions, FrameworkOptionsBuilder};
use janus_telemetry::{LogFormat, TelemetryConfig};

/// Service name used when neither `OTEL_SERVICE_NAME` nor `APP_NAME` is set.
pub const DEFAULT_SERVICE_NAME: &str = "janus";

/// Janus command-line arguments.
#[derive(Debug, Clone, Parser)]
#[command(name = "janus")]
#[command(about = "Hello-world HTTP service that can switch server frameworks at runtime", long_about = None)]
#[command(version)]
pub struct Args {
    /// Address the active framework listens on
    #[arg(long, env = "LISTEN_ADDR", default_value = DEFAULT_LISTEN_ADDR)]
    pub listen_addr: String,

    /// Initial log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format (text or json)
    #[arg(long, env = "LOG_FORMAT", default_value = "text")]
    pub log_format: LogFormat,

    /// Export traces over OTLP and open a server span per request
    #[arg(long, env = "OTEL_ENABLED")]
    pub otel_enabled: bool,

    /// OTLP collector endpoint
    #[arg(long, env = "OTEL_EXPORTER_OTLP_ENDPOINT", default_value = "http://localhost:4317")]
    pub otlp_endpoint: String,

    /// Record process gauges periodically
    #[arg(long, env = "OTEL_HOST_METRICS")]
    pub otel_host_metrics: bool,

    /// Record tokio runtime gauges periodically
    #[arg(long, env = "OTEL_RUNTIME_METRICS")]
    pub otel_runtime_metrics: bool,

    /// Serve runtime introspection on /debug/dashboard
    #[arg(long, env = "DASHBOARD_ENABLED")]
    pub dashboard_enabled: bool,

    /// Framework to start with
    #[arg(long, env = "WEB_FRAMEWORK", default_value = "hyper")]
    pub framework: String,

    /// Grace period in seconds for in-flight requests when stopping a framework
    #[arg(long, env = "SHUTDOWN_TIMEOUT", default_value_t = DEFAULT_SHUTDOWN_TIMEOUT_SECS)]
    pub shutdown_timeout: u64,

    /// Exit on an unknown framework or a failed start instead of resuming
    #[arg(long, env = "FAIL_FAST")]
    pub fail_fast: bool,

    /// Service name reported in telemetry
    #[arg(long, env = "OTEL_SERVICE_NAME", hide = true)]
    pub service_name: Option<String>,

    /// Application name, used when no service name is set
    #[arg(long, env = "APP_NAME", hide = true)]
    pub app_name: Option<String>,
}

impl Args {
    /// Resolves the service name: `OTEL_SERVICE_NAME`, then `APP_NAME`,
    /// then [`DEFAULT_SERVICE_NAME`].
    #[must_use]
    pub fn service_name(&self) -> &str {
        [&self.service_name, &self.app_name]
            .into_iter()
            .flatten()
            .map(|name| name.trim())
            .find(|name| !name.is_empty())
            .unwrap_or(DEFAULT_SERVICE_NAME)
    }

    /// Failure policy selected by `--fail-fast`.
    #[must_use]
    pub const fn policy(&self) -> FailurePolicy {
        if self.fail_fast {
            FailurePolicy::Exit
        } else {
            FailurePolicy::Resume
        }
    }

    /// Log-level control seeded from `--log-level`; unknown values fall
    /// back to `info`.
    #[must_use]
    pub fn log_level_control(&self) -> LogLevelControl {
        LogLevelControl::new(LogLevel::parse_lossy(&self.log_level))
    }

    /// Telemetry configuration derived from the flags.
    #[must_use]
    pub fn telemetry_config(&self) -> TelemetryConfig {
        TelemetryConfig::builder()
            .service_name(self.service_name())
            .service_version(crate::VERSION)
            .log_format(self.log_format)
            .tracing_enabled(self.otel_enabled)
            .otlp_endpoint(&self.otlp_endpoint)
            .runtime_metrics(self.otel_runtime_metrics)
            .host_metrics(self.otel_host_metrics)
            .build()
    }

    /// Options builder pre-filled from the flags.
    ///
    /// Telemetry handles are added by the caller once they exist.
    #[must_use]
    pub fn options_builder(&self, log_level: LogLevelControl) -> FrameworkOptionsBuilder {
        FrameworkOptions::builder()
            .listen_addr(self.listen_addr.clone())
            .tracing_enabled(self.otel_enabled)
            .dashboard_enabled(self.dashboard_enabled)
            .log_level(log_level)
            .shutdown_timeout(Duration::from_secs(self.shutdown_timeout))
            .service_name(self.service_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("janus").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_flags() {
        let args = parse(&[
            "--listen-addr",
            "0.0.0.0:8080",
            "--log-level",
            "debug",
            "--log-format",
            "json",
            "--otel-enabled",
            "--dashboard-enabled",
            "--framework",
            "axum",
            "--shutdown-timeout",
            "2",
            "--fail-fast",
        ]);

        assert_eq!(args.listen_addr, "0.0.0.0:8080");
        assert_eq!(args.log_format, LogFormat::Json);
        assert!(args.otel_enabled);
        assert!(args.dashboard_enabled);
        assert_eq!(args.framework, "axum");
        assert_eq!(args.policy(), FailurePolicy::Exit);
        assert_eq!(args.log_level_control().level(), LogLevel::Debug);

        let options = args.options_builder(args.log_level_control()).build();
        assert_eq!(options.listen_addr(), "0.0.0.0:8080");
        assert_eq!(options.shutdown_timeout(), Duration::from_secs(2));
        assert!(options.dashboard_enabled());
    }

    #[test]
    fn test_invalid_log_format_rejected() {
        let result = Args::try_parse_from(["janus", "--log-format", "xml"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_log_level_falls_back_to_info() {
        let args = parse(&["--log-level", "chatty"]);
        assert_eq!(args.log_level_control().level(), LogLevel::Info);
    }

    #[test]
    fn test_service_name_precedence() {
        let args = parse(&["--service-name", "svc", "--app-name", "app"]);
        assert_eq!(args.service_name(), "svc");

        let args = parse(&["--app-name", "app", "--service-name", ""]);
        assert_eq!(args.service_name(), "app");

        let mut args = parse(&[]);
        args.service_name = None;
        args.app_name = None;
        assert_eq!(args.service_name(), DEFAULT_SERVICE_NAME);
    }

    #[test]
    fn test_telemetry_config_follows_flags() {
        let args = parse(&["--otel-enabled", "--otel-runtime-metrics", "--service-name", "svc"]);
        let config = args.telemetry_config();

        assert_eq!(config.service_name, "svc");
        assert!(config.tracing.enabled);
        assert!(config.metrics.runtime_metrics);
        assert!(!config.metrics.host_metrics);
    }

    #[test]
    fn test_command_is_well_formed() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }
}
