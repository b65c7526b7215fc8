//! The supervisor control loop.
//!
//! The supervisor owns the single current-adapter slot. It waits on the
//! command channel and the shutdown signal; a framework name stops the
//! current adapter, then constructs and starts a new one. A triggered
//! shutdown stops the current adapter once and ends the loop.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use janus_server::{AdapterRegistry, FrameworkOptions, Supervisor};
//!
//! # async fn example() -> Result<(), janus_server::SupervisorError> {
//! let options = Arc::new(FrameworkOptions::default());
//! let supervisor = Supervisor::new(AdapterRegistry::with_defaults(), options)
//!     .spawn()
//!     .await;
//!
//! supervisor.switch("hyper").await?;
//! supervisor.shutdown();
//! supervisor.join().await
//! # }
//! ```

use std::sync::Arc;

use janus_core::{AppError, ErrorKind};
use janus_telemetry::metrics::{record_switch, set_active_framework};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

use crate::adapter::{Adapter, AdapterContext, AdapterToken};
use crate::command::{self, ActiveFramework, CommandReceiver, CommandSender};
use crate::config::FrameworkOptions;
use crate::error::SupervisorError;
use crate::registry::AdapterRegistry;
use crate::shutdown::ShutdownSignal;

/// What the supervisor does when a switch cannot be completed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Log the failure and keep serving: unknown names are ignored and a
    /// framework that fails to start is replaced by the previous one.
    #[default]
    Resume,
    /// Stop serving and end the loop with an error.
    Exit,
}

/// Builder and entry point for the supervisor task.
#[derive(Debug)]
pub struct Supervisor {
    registry: AdapterRegistry,
    options: Arc<FrameworkOptions>,
    policy: FailurePolicy,
    shutdown: ShutdownSignal,
}

impl Supervisor {
    /// Creates a supervisor with the default policy and its own shutdown
    /// signal.
    #[must_use]
    pub fn new(registry: AdapterRegistry, options: Arc<FrameworkOptions>) -> Self {
        Self {
            registry,
            options,
            policy: FailurePolicy::default(),
            shutdown: ShutdownSignal::new(),
        }
    }

    /// Sets the failure policy.
    #[must_use]
    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Uses `shutdown` as the governing shutdown signal.
    #[must_use]
    pub fn with_shutdown(mut self, shutdown: ShutdownSignal) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Spawns the control loop and returns once it is ready to receive.
    pub async fn spawn(self) -> SupervisorHandle {
        let (commands, rx) = command::channel();
        let (ready_tx, ready_rx) = oneshot::channel();
        let shutdown = self.shutdown.clone();

        let task = tokio::spawn(self.run(commands.clone(), rx, ready_tx));
        // A loop that dies before signalling surfaces through `join`.
        let _ = ready_rx.await;

        SupervisorHandle {
            commands,
            shutdown: StopOnDrop(shutdown),
            task,
        }
    }

    async fn run(
        self,
        commands: CommandSender,
        mut rx: CommandReceiver,
        ready: oneshot::Sender<()>,
    ) -> Result<(), SupervisorError> {
        let stopping = self.shutdown.recv();
        tokio::pin!(stopping);

        let mut state = LoopState {
            frameworks: self.registry.names().into(),
            registry: self.registry,
            options: self.options,
            policy: self.policy,
            commands,
            generation: 0,
            current: None,
        };

        tracing::info!(
            policy = ?state.policy,
            frameworks = %state.frameworks.join(","),
            "Supervisor ready"
        );
        let _ = ready.send(());

        let result = loop {
            tokio::select! {
                biased;

                () = &mut stopping => {
                    tracing::info!("Shutdown signal received, stopping supervisor");
                    break Ok(());
                }

                command = rx.recv() => match command {
                    Some(name) => {
                        if let Err(e) = state.switch(&rx, &name).await {
                            break Err(e);
                        }
                    }
                    None => break Ok(()),
                },
            }
        };

        rx.close();
        state.stop_current(&rx).await;
        tracing::info!("Supervisor stopped");
        result
    }
}

struct Current {
    adapter: Box<dyn Adapter>,
    token: AdapterToken,
}

struct LoopState {
    registry: AdapterRegistry,
    frameworks: Arc<[String]>,
    options: Arc<FrameworkOptions>,
    policy: FailurePolicy,
    commands: CommandSender,
    generation: u64,
    current: Option<Current>,
}

impl LoopState {
    async fn switch(&mut self, rx: &CommandReceiver, name: &str) -> Result<(), SupervisorError> {
        if !self.registry.contains(name) {
            AppError::framework("unknown framework")
                .with_context("framework", name)
                .with_context("known", self.frameworks.join(","))
                .log();
            record_switch(name, "rejected");

            return match self.policy {
                FailurePolicy::Resume => Ok(()),
                FailurePolicy::Exit => {
                    self.stop_current(rx).await;
                    Err(SupervisorError::UnknownFramework(name.to_string()))
                }
            };
        }

        let previous = self.stop_current(rx).await;

        let Err(err) = self.start(rx, name).await else {
            record_switch(name, "started");
            return Ok(());
        };

        log_start_failure(&err, name);
        record_switch(name, "failed");

        let previous = match (self.policy, previous) {
            (FailurePolicy::Resume, Some(previous)) => previous,
            _ => return Err(err),
        };

        tracing::warn!(failed = %name, framework = %previous, "Resuming previous framework");
        match self.start(rx, &previous).await {
            Ok(()) => {
                record_switch(&previous, "resumed");
                Ok(())
            }
            Err(resume_err) => {
                log_start_failure(&resume_err, &previous);
                record_switch(&previous, "failed");
                Err(resume_err)
            }
        }
    }

    /// Constructs and starts a fresh adapter for `name`.
    async fn start(&mut self, rx: &CommandReceiver, name: &str) -> Result<(), SupervisorError> {
        self.generation += 1;
        let token = AdapterToken {
            generation: self.generation,
        };
        let ctx = AdapterContext::new(
            name,
            token,
            Arc::clone(&self.options),
            self.commands.clone(),
            Arc::clone(&self.frameworks),
        );

        let adapter = self
            .registry
            .create(ctx)
            .ok_or_else(|| SupervisorError::UnknownFramework(name.to_string()))?;

        adapter
            .start()
            .await
            .map_err(|source| SupervisorError::Start {
                framework: name.to_string(),
                source,
            })?;

        let local_addr = adapter.local_addr();
        tracing::info!(
            framework = %name,
            generation = token.generation,
            addr = ?local_addr,
            "Framework started"
        );
        set_active_framework(name, true);
        rx.set_active(Some(ActiveFramework {
            token,
            framework: name.to_string(),
            local_addr,
        }));
        self.current = Some(Current { adapter, token });
        Ok(())
    }

    /// Stops and discards the current adapter, returning its framework name.
    async fn stop_current(&mut self, rx: &CommandReceiver) -> Option<String> {
        let Current { adapter, token } = self.current.take()?;
        let framework = adapter.framework().to_string();

        rx.set_active(None);
        adapter.stop().await;
        set_active_framework(&framework, false);

        tracing::info!(
            framework = %framework,
            generation = token.generation,
            "Framework stopped"
        );
        Some(framework)
    }
}

fn log_start_failure(err: &SupervisorError, framework: &str) {
    AppError::wrap(err.to_string(), ErrorKind::Framework, "failed to start framework")
        .with_context("framework", framework)
        .log();
}

/// Handle to a spawned supervisor.
///
/// Dropping the handle triggers shutdown: the loop itself holds a command
/// sender for the adapters it creates, so the channel never closes on its
/// own.
#[derive(Debug)]
pub struct SupervisorHandle {
    commands: CommandSender,
    shutdown: StopOnDrop,
    task: JoinHandle<Result<(), SupervisorError>>,
}

#[derive(Debug)]
struct StopOnDrop(ShutdownSignal);

impl Drop for StopOnDrop {
    fn drop(&mut self) {
        self.0.trigger();
    }
}

impl SupervisorHandle {
    /// The command channel, for handing to other tasks.
    #[must_use]
    pub fn commands(&self) -> &CommandSender {
        &self.commands
    }

    /// Requests a switch to `framework`, returning once it was received.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::Closed`] once the supervisor has exited.
    pub async fn switch(&self, framework: impl Into<String>) -> Result<(), SupervisorError> {
        self.commands.send(framework).await
    }

    /// Requests a switch on behalf of the adapter identified by `token`.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::StaleHandle`] if `token` is not the
    /// active adapter, or [`SupervisorError::Closed`] as for
    /// [`switch`](Self::switch).
    pub async fn switch_as(
        &self,
        token: AdapterToken,
        framework: impl Into<String>,
    ) -> Result<(), SupervisorError> {
        self.commands.send_as(token, framework).await
    }

    /// The adapter currently serving.
    #[must_use]
    pub fn active(&self) -> Option<ActiveFramework> {
        self.commands.active()
    }

    /// Subscribes to changes of the active adapter.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<ActiveFramework>> {
        self.commands.subscribe()
    }

    /// Triggers the governing shutdown signal.
    pub fn shutdown(&self) {
        self.shutdown.0.trigger();
    }

    /// Waits for the loop to end.
    ///
    /// # Errors
    ///
    /// Returns the error that ended the loop under
    /// [`FailurePolicy::Exit`], a start failure with nothing to resume, or
    /// [`SupervisorError::Task`] if the task panicked.
    pub async fn join(self) -> Result<(), SupervisorError> {
        self.task
            .await
            .map_err(|e| SupervisorError::Task(e.to_string()))?
    }
}

/// Waits until `framework` is the active adapter.
///
/// # Errors
///
/// Returns [`SupervisorError::Closed`] if the supervisor exits first.
pub async fn wait_for_framework(
    changes: &mut watch::Receiver<Option<ActiveFramework>>,
    framework: &str,
) -> Result<ActiveFramework, SupervisorError> {
    let active = changes
        .wait_for(|active| active.as_ref().is_some_and(|a| a.framework == framework))
        .await
        .map_err(|_| SupervisorError::Closed)?;
    active.clone().ok_or(SupervisorError::Closed)
}
