//! `hyper-util` auto backend: HTTP/1.1 and HTTP/2 on one listener.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use hyper_util::server::graceful::GracefulShutdown;
use tokio::net::TcpListener;
use tokio::task::JoinSet;

use crate::adapter::{Adapter, AdapterContext};
use crate::error::AdapterError;
use crate::handle::ServerHandle;
use crate::routes::{self, RouteState};
use crate::shutdown::{ConnectionTracker, ShutdownSignal};

/// Registry name.
pub const FRAMEWORK: &str = "auto";

/// Negotiates HTTP/1.1 or HTTP/2 per connection.
#[derive(Debug)]
pub struct AutoAdapter {
    ctx: AdapterContext,
    handle: ServerHandle,
    routes: OnceLock<Arc<RouteState>>,
}

impl AutoAdapter {
    /// Creates an idle adapter.
    #[must_use]
    pub fn new(ctx: AdapterContext) -> Self {
        let handle = ServerHandle::new(ctx.framework(), Arc::clone(ctx.options()));
        Self {
            ctx,
            handle,
            routes: OnceLock::new(),
        }
    }

    /// Constructor suitable for the registry.
    #[must_use]
    pub fn boxed(ctx: AdapterContext) -> Box<dyn Adapter> {
        Box::new(Self::new(ctx))
    }
}

#[async_trait]
impl Adapter for AutoAdapter {
    fn framework(&self) -> &str {
        self.handle.framework()
    }

    async fn start(&self) -> Result<(), AdapterError> {
        let routes = Arc::clone(
            self.routes
                .get_or_init(|| RouteState::new(self.ctx.clone())),
        );
        self.handle
            .start(move |listener, shutdown| serve(listener, shutdown, routes))
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

async fn serve(listener: TcpListener, shutdown: ShutdownSignal, routes: Arc<RouteState>) {
    let builder = auto::Builder::new(TokioExecutor::new());
    let graceful = GracefulShutdown::new();
    let tracker = ConnectionTracker::new();
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, remote_addr)) => {
                    let routes = Arc::clone(&routes);
                    let service = service_fn(move |request: Request<Incoming>| {
                        let routes = Arc::clone(&routes);
                        async move {
                            Ok::<_, Infallible>(routes::dispatch(routes, request, remote_addr).await)
                        }
                    });

                    let conn = builder
                        .serve_connection_with_upgrades(TokioIo::new(stream), service)
                        .into_owned();
                    let conn = graceful.watch(conn);
                    let token = tracker.acquire();

                    connections.spawn(async move {
                        if let Err(e) = conn.await {
                            tracing::debug!(%remote_addr, error = %e, "Connection closed with error");
                        }
                        drop(token);
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
        active = tracker.active_connections(),
        "Listener closed, draining connections"
    );
    graceful.shutdown().await;
    while connections.join_next().await.is_some() {}
}
