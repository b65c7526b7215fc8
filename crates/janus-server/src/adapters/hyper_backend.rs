//! Plain `hyper` HTTP/1.1 backend.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::TokioIo;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;

use crate::adapter::{Adapter, AdapterContext};
use crate::error::AdapterError;
use crate::handle::ServerHandle;
use crate::routes::{self, RouteState};
use crate::shutdown::{ConnectionToken, ConnectionTracker, ShutdownSignal};

/// Registry name.
pub const FRAMEWORK: &str = "hyper";

/// Serves each connection with `hyper::server::conn::http1`.
#[derive(Debug)]
pub struct HyperAdapter {
    ctx: AdapterContext,
    handle: ServerHandle,
    routes: OnceLock<Arc<RouteState>>,
}

impl HyperAdapter {
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

    fn routes(&self) -> Arc<RouteState> {
        Arc::clone(
            self.routes
                .get_or_init(|| RouteState::new(self.ctx.clone())),
        )
    }
}

#[async_trait]
impl Adapter for HyperAdapter {
    fn framework(&self) -> &str {
        self.handle.framework()
    }

    async fn start(&self) -> Result<(), AdapterError> {
        let routes = self.routes();
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
    let tracker = ConnectionTracker::new();
    // Dropping the set aborts every connection, which is how a stop that
    // outlives its grace period force-closes them.
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, remote_addr)) => {
                    connections.spawn(serve_connection(
                        stream,
                        remote_addr,
                        Arc::clone(&routes),
                        shutdown.clone(),
                        tracker.acquire(),
                    ));
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
    tracker.wait_for_shutdown().await;
}

async fn serve_connection(
    stream: TcpStream,
    remote_addr: SocketAddr,
    routes: Arc<RouteState>,
    shutdown: ShutdownSignal,
    _token: ConnectionToken,
) {
    let service = service_fn(move |request: Request<Incoming>| {
        let routes = Arc::clone(&routes);
        async move { Ok::<_, Infallible>(routes::dispatch(routes, request, remote_addr).await) }
    });

    let conn = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
    tokio::pin!(conn);
    let stopping = shutdown.recv();
    tokio::pin!(stopping);
    let mut draining = false;

    loop {
        tokio::select! {
            result = conn.as_mut() => {
                if let Err(e) = result {
                    tracing::debug!(%remote_addr, error = %e, "Connection closed with error");
                }
                break;
            }
            () = &mut stopping, if !draining => {
                draining = true;
                conn.as_mut().graceful_shutdown();
            }
        }
    }
}
