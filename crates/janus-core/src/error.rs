//! Error types for Janus.
//!
//! This module provides [`AppError`], the structured error used by the
//! supervisor and by every route handler. An `AppError` carries:
//!
//! - an [`ErrorKind`] (`config`, `runtime`, `framework`, `validation`)
//! - a human-readable message
//! - an optional wrapped cause
//! - the time it occurred
//! - free-form key/value context
//!
//! Calling [`AppError::log`] increments `janus_errors_total` (labelled by kind
//! and message) and emits a structured `tracing` event. Messages should be
//! fixed strings; anything a client controls belongs in the context.
//!
//! # Example
//!
//! ```
//! use janus_core::{AppError, ErrorKind};
//!
//! let err = AppError::validation("unknown framework")
//!     .with_context("requested", "bogus");
//!
//! assert_eq!(err.kind(), ErrorKind::Validation);
//! assert_eq!(err.to_string(), "validation: unknown framework");
//! ```

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::response::ErrorBody;

/// Name of the counter incremented for every logged [`AppError`].
pub const ERRORS_TOTAL: &str = "janus_errors_total";

/// Boxed error used as the wrapped cause of an [`AppError`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Context keys logged as fields of their own.
///
/// `tracing` field names are fixed at the callsite, so the keys this
/// workspace attaches get a field each; any other key is folded into a
/// single `context` field.
pub const CONTEXT_FIELDS: [&str; 2] = ["framework", "known"];

/// Categories of application errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Invalid or missing configuration.
    Config,
    /// Failure while the application is running (I/O, encoding, ...).
    Runtime,
    /// Failure of a server adapter (bind, start, unknown backend).
    Framework,
    /// Invalid client input.
    Validation,
}

impl ErrorKind {
    /// Returns the label used in logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::Runtime => "runtime",
            Self::Framework => "framework",
            Self::Validation => "validation",
        }
    }

    /// Returns the HTTP status code used when this kind reaches a client.
    #[must_use]
    pub const fn default_status_code(&self) -> StatusCode {
        match self {
            Self::Validation => StatusCode::BAD_REQUEST,
            Self::Config | Self::Runtime | Self::Framework => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured application error.
///
/// The `Display` output is `"<kind>: <message>"`, followed by `": <cause>"`
/// when a cause is attached.
#[derive(Debug, Error)]
#[error("{kind}: {message}{}", cause_suffix(.source.as_deref()))]
pub struct AppError {
    kind: ErrorKind,
    message: String,
    #[source]
    source: Option<BoxError>,
    occurred_at: DateTime<Utc>,
    context: BTreeMap<String, Value>,
}

fn cause_suffix(source: Option<&(dyn std::error::Error + Send + Sync + 'static)>) -> String {
    source.map(|e| format!(": {e}")).unwrap_or_default()
}

impl AppError {
    /// Creates a new error of the given kind.
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
            occurred_at: Utc::now(),
            context: BTreeMap::new(),
        }
    }

    /// Wraps an existing error with a kind and message.
    pub fn wrap(
        source: impl Into<BoxError>,
        kind: ErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source: Some(source.into()),
            ..Self::new(kind, message)
        }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message)
    }

    /// Creates a runtime error.
    #[must_use]
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Runtime, message)
    }

    /// Creates a framework (adapter) error.
    #[must_use]
    pub fn framework(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Framework, message)
    }

    /// Creates a validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Adds a context entry, replacing any previous value for `key`.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.add_context(key, value);
        self
    }

    /// Adds a context entry in place.
    pub fn add_context(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns `true` if this error is of the given kind.
    #[must_use]
    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }

    /// Returns the error message (without the cause).
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the attached context.
    #[must_use]
    pub const fn context(&self) -> &BTreeMap<String, Value> {
        &self.context
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        self.kind.default_status_code()
    }

    /// Renders one context value as a log field.
    fn context_field(&self, key: &str) -> Option<String> {
        self.context.get(key).map(render_value)
    }

    /// Renders the keys outside [`CONTEXT_FIELDS`] as space separated
    /// `key=value` pairs, or `None` when there are none.
    #[must_use]
    pub fn extra_context(&self) -> Option<String> {
        let pairs: Vec<String> = self
            .context
            .iter()
            .filter(|(key, _)| !CONTEXT_FIELDS.contains(&key.as_str()))
            .map(|(key, value)| format!("{key}={}", render_value(value)))
            .collect();
        (!pairs.is_empty()).then(|| pairs.join(" "))
    }

    /// Converts this error into the body sent to clients.
    ///
    /// Only validation messages are exposed; every other kind is reported as
    /// a generic internal error.
    #[must_use]
    pub fn to_body(&self) -> ErrorBody {
        match self.kind {
            ErrorKind::Validation => ErrorBody::new(self.kind.as_str(), &self.message),
            _ => ErrorBody::new(self.kind.as_str(), "Internal server error"),
        }
    }

    /// Records the error in `janus_errors_total` and logs it.
    pub fn log(&self) {
        metrics::counter!(
            ERRORS_TOTAL,
            "error_type" => self.kind.as_str(),
            "error_message" => self.message.clone()
        )
        .increment(1);

        let cause = self.source.as_ref().map(ToString::to_string);
        let framework = self.context_field("framework");
        let known = self.context_field("known");
        let extra = self.extra_context();
        tracing::error!(
            error_type = %self.kind,
            error_message = %self.message,
            occurred_at = %self.occurred_at.to_rfc3339(),
            framework = framework.as_deref(),
            known = known.as_deref(),
            context = extra.as_deref(),
            cause = cause.as_deref(),
            "{}",
            self
        );
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_display_without_cause() {
        let err = AppError::framework("bind failed");
        assert_eq!(err.to_string(), "framework: bind failed");
        assert!(err.source().is_none());
    }

    #[test]
    fn test_display_with_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::AddrInUse, "address in use");
        let err = AppError::wrap(io, ErrorKind::Framework, "failed to bind");
        assert_eq!(err.to_string(), "framework: failed to bind: address in use");
        assert!(err.source().is_some());
    }

    #[test]
    fn test_extra_context_skips_field_keys() {
        let err = AppError::runtime("encode failed")
            .with_context("framework", "hyper")
            .with_context("path", "/")
            .with_context("attempt", 2);

        assert_eq!(err.extra_context().as_deref(), Some("attempt=2 path=/"));
        assert_eq!(err.context().len(), 3);

        let err = AppError::framework("unknown framework").with_context("framework", "gin");
        assert!(err.extra_context().is_none());
    }

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

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
    fn test_log_emits_context_as_fields() {
        let capture = Capture::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            AppError::validation("unknown framework")
                .with_context("framework", "gin")
                .with_context("known", "auto,axum,hyper")
                .with_context("attempt", 2)
                .log();
        });

        let output = String::from_utf8(capture.0.lock().unwrap().clone()).unwrap();
        let line: Value = serde_json::from_str(output.trim()).unwrap();
        let fields = &line["fields"];

        assert_eq!(fields["error_type"], "validation");
        assert_eq!(fields["error_message"], "unknown framework");
        assert_eq!(fields["framework"], "gin");
        assert_eq!(fields["known"], "auto,axum,hyper");
        assert_eq!(fields["context"], "attempt=2");
        assert!(fields.get("cause").is_none());
    }

    #[test]
    fn test_add_context_replaces() {
        let mut err = AppError::config("bad flag");
        err.add_context("flag", "a");
        err.add_context("flag", "b");
        assert_eq!(err.context()["flag"], Value::from("b"));
    }

    #[test]
    fn test_kind_predicates() {
        assert!(AppError::config("x").is(ErrorKind::Config));
        assert!(AppError::runtime("x").is(ErrorKind::Runtime));
        assert!(AppError::framework("x").is(ErrorKind::Framework));
        assert!(AppError::validation("x").is(ErrorKind::Validation));
        assert!(!AppError::validation("x").is(ErrorKind::Runtime));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::validation("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::runtime("x").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_body_hides_internal_detail() {
        let body = AppError::runtime("serializer exploded").to_body();
        assert_eq!(body.message, "Internal server error");

        let body = AppError::validation("missing name").to_body();
        assert_eq!(body.message, "missing name");
        assert_eq!(body.error, "validation");
    }

    #[test]
    fn test_log_without_subscriber() {
        // No recorder or subscriber installed: must be a no-op
        AppError::framework("unknown backend")
            .with_context("name", "bogus")
            .log();
    }

    #[test]
    fn test_kind_serialization() {
        let json = serde_json::to_string(&ErrorKind::Framework).unwrap();
        assert_eq!(json, "\"framework\"");
    }
}
