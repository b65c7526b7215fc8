//! Route behaviour shared by every adapter.
//!
//! Adapters differ in how they accept connections and wire middleware; what
//! each route returns is decided here so every backend answers identically.
//! The hyper-based adapters call [`dispatch`] directly; the axum adapter
//! calls the [`RouteState`] methods from its own handlers.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::request::Parts;
use http::{Method, Request, Response, StatusCode};
use http_body_util::Full;
use janus_core::response::{
    ApiResponse, ErrorBody, FrameworkResponse, HealthResponse, LoggerResponse, RequestEcho,
};
use janus_core::{AppError, ErrorKind, LogLevel, RequestId};
use janus_telemetry::metrics::{record_request, InFlightGuard};
use janus_telemetry::ServerSpan;
use opentelemetry::global::BoxedSpan;
use serde::{Deserialize, Serialize};

use crate::adapter::AdapterContext;
use crate::shutdown::{ConnectionToken, ConnectionTracker};

/// Response header carrying the request id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Metric label for requests that matched no route.
pub const UNMATCHED_ROUTE: &str = "unmatched";

const ROUTES: [&str; 6] = ["/", "/health", "/logger", "/framework", "/metrics", "/debug/dashboard"];

/// Route template used as the `path` metric label.
///
/// Paths come from clients, so anything outside the route table collapses
/// into [`UNMATCHED_ROUTE`].
#[must_use]
pub fn route_label(path: &str) -> &'static str {
    ROUTES
        .into_iter()
        .find(|route| *route == path)
        .unwrap_or(UNMATCHED_ROUTE)
}

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Query of `GET /logger`.
#[derive(Debug, Default, Deserialize)]
pub struct LoggerQuery {
    /// Requested level; absent means read-only.
    pub level: Option<String>,
}

/// Query of `GET /framework`.
#[derive(Debug, Default, Deserialize)]
pub struct FrameworkQuery {
    /// Requested framework.
    pub name: Option<String>,
}

/// Parses a query string, treating malformed input as empty.
#[must_use]
pub fn parse_query<T: Default + for<'de> Deserialize<'de>>(query: Option<&str>) -> T {
    query
        .and_then(|q| serde_urlencoded::from_str(q).ok())
        .unwrap_or_default()
}

/// Body of `GET /debug/dashboard`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardResponse {
    /// Service name.
    pub service: String,
    /// Active framework.
    pub framework: String,
    /// Process id.
    pub pid: u32,
    /// Seconds since startup.
    pub uptime_seconds: f64,
    /// Current log level.
    pub log_level: String,
    /// Tokio worker threads.
    pub tokio_workers: usize,
    /// Alive tokio tasks.
    pub tokio_alive_tasks: usize,
    /// Requests being served by this adapter.
    pub in_flight_requests: usize,
}

/// Shared state behind every route of one adapter instance.
#[derive(Debug)]
pub struct RouteState {
    ctx: AdapterContext,
    hostname: String,
    in_flight: ConnectionTracker,
}

impl RouteState {
    /// Creates the state for an adapter.
    #[must_use]
    pub fn new(ctx: AdapterContext) -> Arc<Self> {
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "unknown".to_string());
        Arc::new(Self {
            ctx,
            hostname,
            in_flight: ConnectionTracker::new(),
        })
    }

    /// Framework serving these routes.
    #[must_use]
    pub fn framework(&self) -> &str {
        self.ctx.framework()
    }

    /// Adapter context.
    #[must_use]
    pub fn context(&self) -> &AdapterContext {
        &self.ctx
    }

    /// `GET /`
    #[must_use]
    pub fn main(&self, parts: &Parts, remote_addr: SocketAddr) -> ApiResponse {
        ApiResponse {
            host: self.hostname.clone(),
            framework: self.framework().to_string(),
            request: RequestEcho::from_parts(parts, remote_addr),
        }
    }

    /// `GET /health`
    #[must_use]
    pub fn health(&self) -> HealthResponse {
        HealthResponse::ok()
    }

    /// `GET /logger`
    ///
    /// Without a level the current value is reported unchanged. Unknown
    /// levels fall back to `info`.
    pub fn set_log_level(&self, level: Option<&str>) -> LoggerResponse {
        let control = self.ctx.options().log_level();
        let (previous, current) = match level {
            Some(raw) => {
                let requested = LogLevel::parse_lossy(raw);
                let previous = control.set(requested);
                if previous != requested {
                    tracing::info!(%previous, current = %requested, "Log level changed");
                }
                (previous, requested)
            }
            None => {
                let level = control.level();
                (level, level)
            }
        };

        LoggerResponse {
            log_level_previous: previous.to_string(),
            log_level_current: current.to_string(),
        }
    }

    /// `GET /framework`
    ///
    /// Requests a switch when `name` differs from the serving framework and
    /// returns once the supervisor has received it.
    pub async fn switch_framework(&self, name: Option<&str>) -> Result<FrameworkResponse, AppError> {
        let current = self.framework();
        let Some(requested) = name.map(str::trim).filter(|n| !n.is_empty()) else {
            return Err(AppError::validation("missing 'name' query parameter"));
        };

        if requested == current {
            return Ok(FrameworkResponse {
                framework_previous: current.to_string(),
                framework_current: current.to_string(),
            });
        }

        if !self.ctx.is_known(requested) {
            return Err(
                AppError::validation("unknown framework")
                    .with_context("framework", requested)
                    .with_context("known", self.ctx.frameworks().join(",")),
            );
        }

        self.ctx
            .commands()
            .send_as(self.ctx.token(), requested)
            .await
            .map_err(|e| {
                AppError::wrap(e, ErrorKind::Runtime, "framework switch rejected")
                    .with_context("framework", requested)
            })?;

        tracing::info!(from = %current, to = %requested, "Framework switch requested");
        Ok(FrameworkResponse {
            framework_previous: current.to_string(),
            framework_current: requested.to_string(),
        })
    }

    /// `GET /metrics`
    pub fn metrics(&self) -> Result<String, AppError> {
        self.ctx
            .options()
            .metrics()
            .map(janus_telemetry::MetricsRegistry::render)
            .ok_or_else(|| AppError::runtime("metrics recorder is not installed"))
    }

    /// `GET /debug/dashboard`, or `None` when the dashboard is disabled.
    #[must_use]
    pub fn dashboard(&self) -> Option<DashboardResponse> {
        let options = self.ctx.options();
        if !options.dashboard_enabled() {
            return None;
        }

        let runtime = tokio::runtime::Handle::try_current().ok().map(|h| h.metrics());
        Some(DashboardResponse {
            service: options.service_name().to_string(),
            framework: self.framework().to_string(),
            pid: std::process::id(),
            uptime_seconds: options.uptime().as_secs_f64(),
            log_level: options.log_level().level().to_string(),
            tokio_workers: runtime.as_ref().map_or(0, tokio::runtime::RuntimeMetrics::num_workers),
            tokio_alive_tasks: runtime
                .as_ref()
                .map_or(0, tokio::runtime::RuntimeMetrics::num_alive_tasks),
            in_flight_requests: self.in_flight.active_connections(),
        })
    }

    /// Begins observing one request: id, timing, in-flight gauge and span.
    #[must_use]
    pub fn observe(&self, parts: &Parts) -> RequestObserver {
        let options = self.ctx.options();
        let span = options.tracer().filter(|_| options.tracing_enabled()).map(|tracer| {
            ServerSpan::start(
                tracer,
                self.framework(),
                &parts.method,
                parts.uri.path(),
                &parts.headers,
            )
        });

        RequestObserver {
            request_id: RequestId::new(),
            started: Instant::now(),
            method: parts.method.clone(),
            path: parts.uri.path().to_string(),
            route: route_label(parts.uri.path()),
            framework: self.framework().to_string(),
            span,
            _in_flight: InFlightGuard::new(self.framework()),
            _active: self.in_flight.acquire(),
        }
    }

    /// Opens a child span for a route handler when tracing is on.
    #[must_use]
    pub fn handler_span(&self, parent: Option<&ServerSpan>, name: &'static str) -> Option<BoxedSpan> {
        let tracer = self.ctx.options().tracer()?;
        parent.map(|span| span.child(tracer, name))
    }
}

/// Tracks one request from arrival to response.
pub struct RequestObserver {
    request_id: RequestId,
    started: Instant,
    method: Method,
    path: String,
    route: &'static str,
    framework: String,
    span: Option<ServerSpan>,
    _in_flight: InFlightGuard,
    _active: ConnectionToken,
}

impl RequestObserver {
    /// Server span, when tracing is on.
    #[must_use]
    pub fn span(&self) -> Option<&ServerSpan> {
        self.span.as_ref()
    }

    /// Stamps the response, records metrics, logs, and ends the span.
    pub fn finish<B>(self, response: &mut Response<B>) {
        let status = response.status();
        if let Ok(value) = HeaderValue::from_str(&self.request_id.to_string()) {
            response.headers_mut().insert(REQUEST_ID_HEADER, value);
        }

        let elapsed = self.started.elapsed();
        record_request(&self.framework, self.route, status.as_u16(), elapsed);

        tracing::info!(
            request_id = %self.request_id,
            framework = %self.framework,
            http.method = %self.method,
            http.path = %self.path,
            http.status_code = status.as_u16(),
            duration_ms = elapsed.as_secs_f64() * 1000.0,
            "Request completed"
        );

        if let Some(span) = self.span {
            span.finish(status.as_u16());
        }
    }
}

/// Serves one request for the hyper-based adapters.
pub async fn dispatch<B>(
    state: Arc<RouteState>,
    request: Request<B>,
    remote_addr: SocketAddr,
) -> Response<Full<Bytes>> {
    let (parts, _body) = request.into_parts();
    let observer = state.observe(&parts);

    let mut response = route(&state, &parts, remote_addr, observer.span()).await;

    observer.finish(&mut response);
    response
}

async fn route(
    state: &RouteState,
    parts: &Parts,
    remote_addr: SocketAddr,
    span: Option<&ServerSpan>,
) -> Response<Full<Bytes>> {
    let path = parts.uri.path();
    if parts.method != Method::GET {
        return match route_label(path) {
            UNMATCHED_ROUTE => not_found(),
            _ => error_response(
                StatusCode::METHOD_NOT_ALLOWED,
                &ErrorBody::new("method_not_allowed", "only GET is supported"),
            ),
        };
    }

    match path {
        "/" => {
            let _span = state.handler_span(span, "main");
            json_response(StatusCode::OK, &state.main(parts, remote_addr))
        }
        "/health" => {
            let _span = state.handler_span(span, "health");
            json_response(StatusCode::OK, &state.health())
        }
        "/logger" => {
            let _span = state.handler_span(span, "logger");
            let query: LoggerQuery = parse_query(parts.uri.query());
            json_response(StatusCode::OK, &state.set_log_level(query.level.as_deref()))
        }
        "/framework" => {
            let _span = state.handler_span(span, "framework");
            let query: FrameworkQuery = parse_query(parts.uri.query());
            match state.switch_framework(query.name.as_deref()).await {
                Ok(body) => json_response(StatusCode::OK, &body),
                Err(err) => app_error_response(&err),
            }
        }
        "/metrics" => match state.metrics() {
            Ok(text) => metrics_response(text),
            Err(err) => app_error_response(&err),
        },
        "/debug/dashboard" => match state.dashboard() {
            Some(body) => json_response(StatusCode::OK, &body),
            None => not_found(),
        },
        _ => not_found(),
    }
}

/// Serializes `body` as JSON.
///
/// An encoding failure is logged and answered with a generic 500.
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    match serde_json::to_vec(body) {
        Ok(bytes) => bytes_response(status, "application/json", Bytes::from(bytes)),
        Err(e) => {
            let err = AppError::wrap(e, ErrorKind::Runtime, "failed to encode response");
            app_error_response(&err)
        }
    }
}

/// Logs `err` and renders its client-safe body.
pub fn app_error_response(err: &AppError) -> Response<Full<Bytes>> {
    err.log();
    error_response(err.status_code(), &err.to_body())
}

fn error_response(status: StatusCode, body: &ErrorBody) -> Response<Full<Bytes>> {
    let bytes = serde_json::to_vec(body).unwrap_or_else(|_| {
        br#"{"error":"runtime","message":"Internal server error"}"#.to_vec()
    });
    bytes_response(status, "application/json", Bytes::from(bytes))
}

/// 404 with a JSON body.
pub fn not_found() -> Response<Full<Bytes>> {
    error_response(
        StatusCode::NOT_FOUND,
        &ErrorBody::new("not_found", "route not found"),
    )
}

/// Prometheus text exposition.
pub fn metrics_response(text: String) -> Response<Full<Bytes>> {
    bytes_response(StatusCode::OK, PROMETHEUS_CONTENT_TYPE, Bytes::from(text))
}

fn bytes_response(status: StatusCode, content_type: &'static str, body: Bytes) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}
