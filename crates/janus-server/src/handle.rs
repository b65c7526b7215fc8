//! Per-adapter lifecycle state.
//!
//! ```text
//! Idle ──start──▶ Starting ──task spawned──▶ Running
//!  ▲                                           │
//!  └──── drained or grace elapsed ◀── Stopping ◀┘ stop
//! ```
//!
//! The lock only guards state transitions. Binding and draining happen with
//! it released, and `start`/`stop` arriving mid-transition are ignored.

use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use janus_core::{AppError, ErrorKind};
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::config::FrameworkOptions;
use crate::error::AdapterError;
use crate::shutdown::ShutdownSignal;

/// Observable lifecycle state of a [`ServerHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Not serving.
    Idle,
    /// Binding the listener.
    Starting,
    /// Serving task running.
    Running,
    /// Draining connections.
    Stopping,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
        })
    }
}

struct Serving {
    local_addr: SocketAddr,
    shutdown: ShutdownSignal,
    task: JoinHandle<()>,
}

enum State {
    Idle,
    Starting,
    Running(Serving),
    Stopping,
}

impl State {
    const fn lifecycle(&self) -> LifecycleState {
        match self {
            Self::Idle => LifecycleState::Idle,
            Self::Starting => LifecycleState::Starting,
            Self::Running(_) => LifecycleState::Running,
            Self::Stopping => LifecycleState::Stopping,
        }
    }
}

/// Owns one listener and the task serving it.
///
/// Adapters delegate `start`/`stop` here and supply only the serve loop.
pub struct ServerHandle {
    framework: String,
    options: Arc<FrameworkOptions>,
    state: Mutex<State>,
}

impl ServerHandle {
    /// Creates an idle handle.
    #[must_use]
    pub fn new(framework: impl Into<String>, options: Arc<FrameworkOptions>) -> Self {
        Self {
            framework: framework.into(),
            options,
            state: Mutex::new(State::Idle),
        }
    }

    /// Framework name this handle serves.
    #[must_use]
    pub fn framework(&self) -> &str {
        &self.framework
    }

    /// Shared options.
    #[must_use]
    pub fn options(&self) -> &Arc<FrameworkOptions> {
        &self.options
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.state.lock().lifecycle()
    }

    /// Returns `true` while running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        matches!(*self.state.lock(), State::Running(_))
    }

    /// Address of the bound listener while running.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match &*self.state.lock() {
            State::Running(serving) => Some(serving.local_addr),
            _ => None,
        }
    }

    /// Binds the listen address and spawns `serve` on the listener.
    ///
    /// `serve` must return once the shutdown signal it is given fires and
    /// its listener is dropped. Calling `start` when not idle logs and
    /// returns `Ok`.
    pub async fn start<F, Fut>(&self, serve: F) -> Result<(), AdapterError>
    where
        F: FnOnce(TcpListener, ShutdownSignal) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        {
            let mut state = self.state.lock();
            if !matches!(*state, State::Idle) {
                tracing::debug!(
                    framework = %self.framework,
                    state = %state.lifecycle(),
                    "Start ignored, handle is not idle"
                );
                return Ok(());
            }
            *state = State::Starting;
        }

        let addr = self.options.listen_addr();
        let listener = match TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(source) => {
                *self.state.lock() = State::Idle;
                return Err(AdapterError::Bind {
                    addr: addr.to_string(),
                    source,
                });
            }
        };
        let local_addr = match listener.local_addr() {
            Ok(local_addr) => local_addr,
            Err(e) => {
                *self.state.lock() = State::Idle;
                return Err(AdapterError::LocalAddr(e));
            }
        };

        let shutdown = ShutdownSignal::new();
        let task = tokio::spawn(serve(listener, shutdown.clone()));

        *self.state.lock() = State::Running(Serving {
            local_addr,
            shutdown,
            task,
        });

        tracing::info!(framework = %self.framework, addr = %local_addr, "Server started");
        Ok(())
    }

    /// Stops the serving task.
    ///
    /// Waits up to the configured grace period for the task to finish
    /// draining, then aborts it. Calling `stop` when not running is a no-op.
    pub async fn stop(&self) {
        let serving = {
            let mut state = self.state.lock();
            match std::mem::replace(&mut *state, State::Stopping) {
                State::Running(serving) => serving,
                other => {
                    *state = other;
                    return;
                }
            }
        };

        let Serving {
            local_addr,
            shutdown,
            mut task,
        } = serving;
        let grace = self.options.shutdown_timeout();

        tracing::info!(framework = %self.framework, addr = %local_addr, ?grace, "Stopping server");
        shutdown.trigger();

        match tokio::time::timeout(grace, &mut task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                AppError::wrap(e, ErrorKind::Runtime, "serving task ended abnormally")
                    .with_context("framework", self.framework.as_str())
                    .log();
            }
            Err(_) => {
                tracing::warn!(
                    framework = %self.framework,
                    ?grace,
                    "Grace period elapsed, force-closing remaining connections"
                );
                task.abort();
                let _ = task.await;
            }
        }

        *self.state.lock() = State::Idle;
        tracing::info!(framework = %self.framework, "Server stopped");
    }
}

impl fmt::Debug for ServerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerHandle")
            .field("framework", &self.framework)
            .field("state", &self.state())
            .field("local_addr", &self.local_addr())
            .finish()
    }
}
