//! # Janus Core
//!
//! Core types shared by every Janus crate.
//!
//! - [`AppError`] - Structured application error with kind, cause, timestamp and context
//! - [`LogLevelControl`] - Concurrency-safe log level cell shared by all adapters
//! - [`RequestId`] - UUID v7 request identifier
//! - [`response`] - JSON bodies returned by the HTTP surface

#![doc(html_root_url = "https://docs.rs/janus-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod context;
mod error;
mod level;
pub mod response;

pub use context::RequestId;
pub use error::{AppError, BoxError, ErrorKind, CONTEXT_FIELDS, ERRORS_TOTAL};
pub use level::{LogLevel, LogLevelControl, ParseLevelError};
