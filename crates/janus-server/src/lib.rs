//! # Janus Server
//!
//! Hot-swappable HTTP backends and the supervisor that switches between
//! them while the process keeps running.
//!
//! - [`Adapter`]: one HTTP server technology behind `start`/`stop`
//! - [`ServerHandle`]: per-instance lifecycle and listener ownership
//! - [`AdapterRegistry`]: framework name → adapter constructor
//! - [`Supervisor`]: owns the single live adapter and sequences switches
//! - [`CommandSender`]: the rendezvous channel feeding the supervisor
//!
//! Every adapter serves the same routes (see [`routes`]):
//!
//! | route | response |
//! |---|---|
//! | `GET /` | request echo, hostname and active framework |
//! | `GET /health` | `{"status":"ok"}` |
//! | `GET /logger?level=` | previous and current log level |
//! | `GET /framework?name=` | previous and requested framework |
//! | `GET /metrics` | Prometheus exposition |
//! | `GET /debug/dashboard` | runtime introspection, when enabled |
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use janus_server::{AdapterRegistry, FrameworkOptions, ShutdownSignal, Supervisor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let options = FrameworkOptions::builder()
//!         .listen_addr("127.0.0.1:3000")
//!         .build();
//!
//!     let supervisor = Supervisor::new(AdapterRegistry::with_defaults(), Arc::new(options))
//!         .with_shutdown(ShutdownSignal::with_os_signals())
//!         .spawn()
//!         .await;
//!
//!     supervisor.switch("hyper").await?;
//!     supervisor.join().await?;
//!     Ok(())
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/janus-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod adapter;
pub mod adapters;
pub mod command;
pub mod config;
pub mod error;
pub mod handle;
pub mod registry;
pub mod routes;
pub mod shutdown;
pub mod supervisor;

pub use adapter::{Adapter, AdapterContext, AdapterToken};
pub use adapters::{AutoAdapter, AxumAdapter, HyperAdapter};
pub use command::{ActiveFramework, CommandSender};
pub use config::{FrameworkOptions, FrameworkOptionsBuilder};
pub use error::{AdapterError, SupervisorError};
pub use handle::{LifecycleState, ServerHandle};
pub use registry::{AdapterConstructor, AdapterRegistry};
pub use shutdown::{ConnectionToken, ConnectionTracker, ShutdownSignal};
pub use supervisor::{wait_for_framework, FailurePolicy, Supervisor, SupervisorHandle};
