//! The adapter contract.
//!
//! An adapter wraps one HTTP server technology behind two operations,
//! `start` and `stop`. Each instance owns a fresh [`ServerHandle`] and is
//! used for exactly one serving lifetime; switching back to a framework
//! constructs a new instance.
//!
//! [`ServerHandle`]: crate::ServerHandle

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;

use crate::command::CommandSender;
use crate::config::FrameworkOptions;
use crate::error::AdapterError;

/// Identifies one adapter instance.
///
/// Generations increase with every adapter the supervisor constructs, so a
/// token outliving its adapter can be recognised as stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AdapterToken {
    /// Monotonic instance number.
    pub generation: u64,
}

/// One HTTP server technology that can be started and stopped.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Registry name of this adapter.
    fn framework(&self) -> &str;

    /// Binds the listener and launches the serving task.
    ///
    /// Returns once the task is running. Calling it while running is a
    /// logged no-op.
    async fn start(&self) -> Result<(), AdapterError>;

    /// Stops serving: closes the listener, drains in-flight requests for up
    /// to the grace period, then force-closes what remains.
    ///
    /// Calling it while stopped is a no-op. Never fails; problems are logged.
    async fn stop(&self);

    /// Returns `true` while the serving task is running.
    fn is_running(&self) -> bool;

    /// Address of the bound listener while running.
    fn local_addr(&self) -> Option<SocketAddr>;
}

/// Everything an adapter constructor receives.
#[derive(Debug, Clone)]
pub struct AdapterContext {
    framework: String,
    token: AdapterToken,
    options: Arc<FrameworkOptions>,
    commands: CommandSender,
    frameworks: Arc<[String]>,
}

impl AdapterContext {
    /// Creates a context.
    #[must_use]
    pub fn new(
        framework: impl Into<String>,
        token: AdapterToken,
        options: Arc<FrameworkOptions>,
        commands: CommandSender,
        frameworks: Arc<[String]>,
    ) -> Self {
        Self {
            framework: framework.into(),
            token,
            options,
            commands,
            frameworks,
        }
    }

    /// Registry name the adapter was constructed under.
    #[must_use]
    pub fn framework(&self) -> &str {
        &self.framework
    }

    /// Token identifying the adapter instance.
    #[must_use]
    pub fn token(&self) -> AdapterToken {
        self.token
    }

    /// Shared options.
    #[must_use]
    pub fn options(&self) -> &Arc<FrameworkOptions> {
        &self.options
    }

    /// Channel to request framework switches.
    #[must_use]
    pub fn commands(&self) -> &CommandSender {
        &self.commands
    }

    /// Returns `true` if a constructor is registered under `name`.
    #[must_use]
    pub fn is_known(&self, name: &str) -> bool {
        self.frameworks.iter().any(|f| f == name)
    }

    /// All registered framework names.
    #[must_use]
    pub fn frameworks(&self) -> &[String] {
        &self.frameworks
    }
}
