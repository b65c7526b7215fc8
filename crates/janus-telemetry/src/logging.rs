//! Structured logging for Janus.
//!
//! The subscriber's level filter is not fixed at startup. It reads a shared
//! [`LogLevelControl`] for every event, so `GET /logger?level=debug` on any
//! adapter changes verbosity for the whole process immediately.
//!
//! # Example
//!
//! ```rust,ignore
//! use janus_core::{LogLevel, LogLevelControl};
//! use janus_telemetry::logging::{LogConfig, init_logging};
//!
//! let control = LogLevelControl::new(LogLevel::Info);
//! init_logging(&LogConfig::default(), &control)?;
//!
//! tracing::info!(framework = "hyper", "Starting adapter");
//! ```

use std::fmt;
use std::str::FromStr;

use janus_core::LogLevelControl;
use tracing::Metadata;
use tracing_subscriber::filter::{dynamic_filter_fn, DynFilterFn};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

use crate::error::TelemetryError;
use crate::TelemetryResult;

/// Output format of log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable single-line output.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

impl LogFormat {
    /// Returns the format name as accepted on the command line.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogFormat {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "console" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(TelemetryError::InvalidConfig(format!(
                "log format '{other}' (expected 'text' or 'json')"
            ))),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Whether logging is enabled.
    pub enabled: bool,

    /// Output format.
    pub format: LogFormat,

    /// Whether to include file/line info.
    pub file_line_info: bool,

    /// Whether to include thread IDs.
    pub thread_ids: bool,

    /// Whether to include target (module path).
    pub include_target: bool,

    /// Service name for log fields.
    pub service_name: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            format: LogFormat::Text,
            file_line_info: false,
            thread_ids: false,
            include_target: true,
            service_name: "janus".to_string(),
        }
    }
}

/// Per-event filter that admits events at or above `control`'s level.
pub(crate) fn level_filter<S>(
    control: LogLevelControl,
) -> DynFilterFn<S, impl Fn(&Metadata<'_>, &Context<'_, S>) -> bool> {
    dynamic_filter_fn(move |meta, _cx| control.enabled(meta.level()))
}

/// Installs the global subscriber.
///
/// Events are filtered against `control` each time they fire; callsite
/// interest is never cached.
///
/// # Errors
///
/// Returns `TelemetryError::LoggingInit` if a global subscriber is already
/// installed.
pub fn init_logging(config: &LogConfig, control: &LogLevelControl) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    match config.format {
        LogFormat::Json => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_file(config.file_line_info)
                .with_line_number(config.file_line_info)
                .with_thread_ids(config.thread_ids)
                .with_target(config.include_target)
                .with_filter(level_filter(control.clone()));

            tracing_subscriber::registry()
                .with(fmt_layer)
                .try_init()
                .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;
        }
        LogFormat::Text => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .with_file(config.file_line_info)
                .with_line_number(config.file_line_info)
                .with_thread_ids(config.thread_ids)
                .with_target(config.include_target)
                .with_filter(level_filter(control.clone()));

            tracing_subscriber::registry()
                .with(fmt_layer)
                .try_init()
                .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;
        }
    }

    tracing::debug!(
        service = %config.service_name,
        format = %config.format,
        level = %control.level(),
        "Logging initialized"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use janus_core::LogLevel;

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert!(config.enabled);
        assert_eq!(config.format, LogFormat::Text);
        assert_eq!(config.service_name, "janus");
    }

    #[test]
    fn test_parse_format() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("TEXT".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert_eq!("console".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_format_display_roundtrip() {
        for format in [LogFormat::Text, LogFormat::Json] {
            assert_eq!(format.to_string().parse::<LogFormat>().unwrap(), format);
        }
    }

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Capture {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl std::io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_filter_follows_level_control() {
        let control = LogLevelControl::new(LogLevel::Info);
        let capture = Capture::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::registry().with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(move || writer.clone())
                .with_filter(level_filter(control.clone())),
        );

        tracing::subscriber::with_default(subscriber, || {
            tracing::debug!("hidden at info");
            tracing::info!("shown at info");

            control.set(LogLevel::Debug);
            tracing::debug!("shown after lowering");

            control.set(LogLevel::Warn);
            tracing::info!("hidden at warn");
        });

        let output = capture.contents();
        assert!(!output.contains("hidden at info"));
        assert!(output.contains("shown at info"));
        assert!(output.contains("shown after lowering"));
        assert!(!output.contains("hidden at warn"));
    }

    #[test]
    fn test_disabled_logging() {
        let config = LogConfig {
            enabled: false,
            ..Default::default()
        };

        assert!(init_logging(&config, &LogLevelControl::default()).is_ok());
    }
}
