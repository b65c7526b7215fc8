//! OpenTelemetry distributed tracing for Janus.
//!
//! OTLP export over gRPC with a batch span processor, W3C trace context
//! propagation, and helpers adapters use to open a server span per request.
//!
//! # Example
//!
//! ```rust,ignore
//! use janus_telemetry::tracing::{TracingConfig, init_tracing};
//!
//! let provider = init_tracing(&TracingConfig::default())?;
//! ```

use opentelemetry::global::{self, BoxedSpan, BoxedTracer};
use opentelemetry::trace::{SpanKind, Status, TraceContextExt, Tracer};
use opentelemetry::{Context, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::{RandomIdGenerator, Sampler, TracerProvider};
use opentelemetry_sdk::Resource;

use crate::error::TelemetryError;
use crate::TelemetryResult;

/// Tracing configuration.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Whether tracing is enabled.
    pub enabled: bool,

    /// OTLP endpoint (e.g., `http://localhost:4317`).
    pub otlp_endpoint: String,

    /// Service name for spans.
    pub service_name: String,

    /// Service version.
    pub service_version: String,

    /// Sampling ratio (0.0 to 1.0).
    pub sample_ratio: f64,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            otlp_endpoint: "http://localhost:4317".to_string(),
            service_name: "janus".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            sample_ratio: 1.0,
        }
    }
}

/// Initializes the tracing subsystem.
///
/// Installs the provider and a W3C trace-context propagator globally and
/// returns the provider so the caller can flush it on exit.
///
/// # Errors
///
/// Returns `TelemetryError::TracingInit` if the exporter cannot be built.
pub fn init_tracing(config: &TracingConfig) -> TelemetryResult<Option<TracerProvider>> {
    if !config.enabled {
        return Ok(None);
    }

    let resource = Resource::new([
        KeyValue::new(
            opentelemetry_semantic_conventions::attribute::SERVICE_NAME,
            config.service_name.clone(),
        ),
        KeyValue::new(
            opentelemetry_semantic_conventions::attribute::SERVICE_VERSION,
            config.service_version.clone(),
        ),
    ]);

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(&config.otlp_endpoint)
        .build()
        .map_err(|e| TelemetryError::TracingInit(e.to_string()))?;

    let sampler = if config.sample_ratio >= 1.0 {
        Sampler::AlwaysOn
    } else if config.sample_ratio <= 0.0 {
        Sampler::AlwaysOff
    } else {
        Sampler::TraceIdRatioBased(config.sample_ratio)
    };

    let provider = TracerProvider::builder()
        .with_batch_exporter(exporter, opentelemetry_sdk::runtime::Tokio)
        .with_sampler(sampler)
        .with_id_generator(RandomIdGenerator::default())
        .with_resource(resource)
        .build();

    global::set_text_map_propagator(TraceContextPropagator::new());
    global::set_tracer_provider(provider.clone());

    tracing::info!(endpoint = %config.otlp_endpoint, "OpenTelemetry tracing enabled");

    Ok(Some(provider))
}

/// Returns a tracer from the global provider.
#[must_use]
pub fn tracer(name: &'static str) -> BoxedTracer {
    global::tracer(name)
}

/// Extracts trace context from HTTP headers.
pub fn extract_context(headers: &http::HeaderMap) -> Context {
    global::get_text_map_propagator(|propagator| propagator.extract(&HeaderExtractor(headers)))
}

/// HTTP header extractor for `http::HeaderMap`.
pub struct HeaderExtractor<'a>(pub &'a http::HeaderMap);

impl opentelemetry::propagation::Extractor for HeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(http::HeaderName::as_str).collect()
    }
}

/// A server span covering one request.
///
/// Ended by [`ServerSpan::finish`]; the SDK also ends it on drop if the
/// request future is cancelled.
#[derive(Debug, Clone)]
pub struct ServerSpan {
    cx: Context,
}

impl ServerSpan {
    /// Opens a server span whose parent is taken from the request headers.
    pub fn start(
        tracer: &BoxedTracer,
        framework: &str,
        method: &http::Method,
        path: &str,
        headers: &http::HeaderMap,
    ) -> Self {
        let parent = extract_context(headers);
        let span = tracer
            .span_builder(format!("{method} {path}"))
            .with_kind(SpanKind::Server)
            .with_attributes([
                KeyValue::new("http.request.method", method.to_string()),
                KeyValue::new("url.path", path.to_string()),
                KeyValue::new("janus.framework", framework.to_string()),
            ])
            .start_with_context(tracer, &parent);

        Self {
            cx: parent.with_span(span),
        }
    }

    /// Opens a child span for a route handler. It ends when dropped.
    pub fn child(&self, tracer: &BoxedTracer, name: &'static str) -> BoxedSpan {
        tracer.start_with_context(name, &self.cx)
    }

    /// Records the response status and ends the span.
    pub fn finish(self, status: u16) {
        let span = self.cx.span();
        span.set_attribute(KeyValue::new("http.response.status_code", i64::from(status)));
        if status >= 500 {
            span.set_status(Status::error(format!("HTTP {status}")));
        }
        span.end();
    }
}
