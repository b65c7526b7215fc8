//! Built-in adapters.
//!
//! | name | technology |
//! |------|------------|
//! | `hyper` | `hyper` HTTP/1.1 connections, drained with per-connection graceful shutdown |
//! | `auto` | `hyper-util` auto builder (HTTP/1.1 and HTTP/2) watched by `GracefulShutdown` |
//! | `axum` | `axum::serve` with `tower-http` tracing and gzip compression |

pub mod auto_backend;
pub mod axum_backend;
pub mod hyper_backend;

pub use auto_backend::AutoAdapter;
pub use axum_backend::AxumAdapter;
pub use hyper_backend::HyperAdapter;
