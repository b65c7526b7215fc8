//! `axum` backend with `tower-http` middleware.
//!
//! The router is served connection by connection through `hyper-util`
//! rather than `axum::serve`, so every connection task lives in a `JoinSet`
//! owned by the serving task. Aborting that task after the grace period
//! closes them all.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::{ConnectInfo, RawQuery, Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::get;
use axum::{Extension, Router};
use bytes::Bytes;
use http_body_util::Full;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use hyper_util::server::graceful::GracefulShutdown;
use hyper_util::service::TowerToHyperService;
use janus_telemetry::ServerSpan;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;

use crate::adapter::{Adapter, AdapterContext};
use crate::error::AdapterError;
use crate::handle::ServerHandle;
use crate::routes::{self, FrameworkQuery, LoggerQuery, RouteState};
use crate::shutdown::ShutdownSignal;

/// Registry name.
pub const FRAMEWORK: &str = "axum";

type AppState = Arc<RouteState>;

/// Serves an `axum::Router`.
#[derive(Debug)]
pub struct AxumAdapter {
    ctx: AdapterContext,
    handle: ServerHandle,
}

impl AxumAdapter {
    /// Creates an idle adapter.
    #[must_use]
    pub fn new(ctx: AdapterContext) -> Self {
        let handle = ServerHandle::new(ctx.framework(), Arc::clone(ctx.options()));
        Self { ctx, handle }
    }

    /// Constructor suitable for the registry.
    #[must_use]
    pub fn boxed(ctx: AdapterContext) -> Box<dyn Adapter> {
        Box::new(Self::new(ctx))
    }
}

#[async_trait]
impl Adapter for AxumAdapter {
    fn framework(&self) -> &str {
        self.handle.framework()
    }

    async fn start(&self) -> Result<(), AdapterError> {
        let ctx = self.ctx.clone();
        self.handle
            .start(move |listener, shutdown| serve(listener, shutdown, router(RouteState::new(ctx))))
            .await
    }

    async fn stop(&self) {
        self.handle.stop().await;
    }

    fn is_running(&self) -> bool {
        self.handle.is_running()
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        self.handle.local_addr()
    }
}

/// Builds the router serving every route.
pub fn router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/logger", get(logger))
        .route("/framework", get(framework))
        .route("/metrics", get(metrics));
    if state.context().options().dashboard_enabled() {
        router = router.route("/debug/dashboard", get(dashboard));
    }

    router
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(Arc::clone(&state), observe))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn serve(listener: TcpListener, shutdown: ShutdownSignal, app: Router) {
    let builder = auto::Builder::new(TokioExecutor::new());
    let graceful = GracefulShutdown::new();
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, remote_addr)) => {
                    // Handlers read the peer address through `ConnectInfo`.
                    let app = app.clone().layer(Extension(ConnectInfo(remote_addr)));
                    let conn = builder
                        .serve_connection_with_upgrades(TokioIo::new(stream), TowerToHyperService::new(app))
                        .into_owned();
                    let conn = graceful.watch(conn);

                    connections.spawn(async move {
                        if let Err(e) = conn.await {
                            tracing::debug!(%remote_addr, error = %e, "Connection closed with error");
                        }
                    });
                }
                Err(e) => tracing::warn!(framework = FRAMEWORK, error = %e, "Failed to accept connection"),
            },
            () = shutdown.recv() => break,
        }
        while connections.try_join_next().is_some() {}
    }

    drop(listener);
    tracing::debug!(
        framework = FRAMEWORK,
        connections = connections.len(),
        "Listener closed, draining connections"
    );
    graceful.shutdown().await;
    while connections.join_next().await.is_some() {}
}

fn into_axum(response: http::Response<Full<Bytes>>) -> Response {
    response.map(Body::new)
}

async fn observe(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let (mut parts, body) = request.into_parts();
    let observer = state.observe(&parts);
    if let Some(span) = observer.span() {
        parts.extensions.insert(span.clone());
    }

    let mut response = next.run(Request::from_parts(parts, body)).await;
    observer.finish(&mut response);
    response
}

fn parent(span: Option<&Extension<ServerSpan>>) -> Option<&ServerSpan> {
    span.map(|Extension(span)| span)
}

async fn root(
    State(state): State<AppState>,
    ConnectInfo(remote_addr): ConnectInfo<SocketAddr>,
    span: Option<Extension<ServerSpan>>,
    request: Request,
) -> Response {
    let _span = state.handler_span(parent(span.as_ref()), "main");
    let (parts, _body) = request.into_parts();
    into_axum(routes::json_response(
        http::StatusCode::OK,
        &state.main(&parts, remote_addr),
    ))
}

async fn health(State(state): State<AppState>, span: Option<Extension<ServerSpan>>) -> Response {
    let _span = state.handler_span(parent(span.as_ref()), "health");
    into_axum(routes::json_response(http::StatusCode::OK, &state.health()))
}

async fn logger(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
    span: Option<Extension<ServerSpan>>,
) -> Response {
    let _span = state.handler_span(parent(span.as_ref()), "logger");
    let query: LoggerQuery = routes::parse_query(query.as_deref());
    into_axum(routes::json_response(
        http::StatusCode::OK,
        &state.set_log_level(query.level.as_deref()),
    ))
}

async fn framework(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
    span: Option<Extension<ServerSpan>>,
) -> Response {
    let _span = state.handler_span(parent(span.as_ref()), "framework");
    let query: FrameworkQuery = routes::parse_query(query.as_deref());
    let response = match state.switch_framework(query.name.as_deref()).await {
        Ok(body) => routes::json_response(http::StatusCode::OK, &body),
        Err(err) => routes::app_error_response(&err),
    };
    into_axum(response)
}

async fn metrics(State(state): State<AppState>) -> Response {
    let response = match state.metrics() {
        Ok(text) => routes::metrics_response(text),
        Err(err) => routes::app_error_response(&err),
    };
    into_axum(response)
}

async fn dashboard(State(state): State<AppState>) -> Response {
    let response = match state.dashboard() {
        Some(body) => routes::json_response(http::StatusCode::OK, &body),
        None => routes::not_found(),
    };
    into_axum(response)
}

async fn not_found() -> Response {
    into_axum(routes::not_found())
}
