//! # Janus
//!
//! A "hello world" HTTP service that can swap the server framework serving
//! it while the process keeps running.
//!
//! ```text
//!   GET /framework?name=axum
//!            │
//!            ▼
//!   ┌─────────────────┐  command channel  ┌────────────┐
//!   │ active adapter  │ ────────────────▶ │ supervisor │
//!   │ (hyper)         │ ◀──── stop ────── │            │
//!   └─────────────────┘                   └─────┬──────┘
//!                                               │ start
//!                                               ▼
//!                                      ┌─────────────────┐
//!                                      │ new adapter     │
//!                                      │ (axum)          │
//!                                      └─────────────────┘
//! ```
//!
//! # Example Usage
//!
//! ```bash
//! # Start on hyper, then switch to axum over HTTP
//! $ janus --framework hyper --listen-addr 127.0.0.1:3000
//! $ curl 'http://127.0.0.1:3000/framework?name=axum'
//!
//! # Configure from the environment
//! $ WEB_FRAMEWORK=auto LOG_FORMAT=json OTEL_ENABLED=true janus
//! ```

#![doc(html_root_url = "https://docs.rs/janus/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod app;
pub mod cli;

pub use app::run;
pub use cli::Args;

/// Janus version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
