//! Errors raised by adapters and the supervisor.

use std::io;

use thiserror::Error;

/// Errors an adapter can report from `start`.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The listen address could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address that was requested.
        addr: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The bound listener could not report its local address.
    #[error("failed to read local address: {0}")]
    LocalAddr(#[source] io::Error),
}

/// Errors returned by the supervisor and its handle.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// The supervisor loop has exited; commands are no longer accepted.
    #[error("supervisor is not running")]
    Closed,

    /// The token refers to an adapter that is no longer the active one.
    #[error("stale adapter token: generation {token} is not current (current: {current:?})")]
    StaleHandle {
        /// Generation carried by the caller.
        token: u64,
        /// Generation of the active adapter, if any.
        current: Option<u64>,
    },

    /// No constructor is registered under this name.
    #[error("unknown framework: {0}")]
    UnknownFramework(String),

    /// A new adapter failed to start.
    #[error("failed to start {framework}: {source}")]
    Start {
        /// Framework that failed.
        framework: String,
        /// Cause reported by the adapter.
        #[source]
        source: AdapterError,
    },

    /// The supervisor task panicked or was cancelled.
    #[error("supervisor task failed: {0}")]
    Task(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_error_display() {
        let err = AdapterError::Bind {
            addr: "127.0.0.1:80".to_string(),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "permission denied"),
        };
        assert_eq!(err.to_string(), "failed to bind 127.0.0.1:80: permission denied");
    }

    #[test]
    fn test_stale_handle_display() {
        let err = SupervisorError::StaleHandle {
            token: 1,
            current: Some(2),
        };
        assert_eq!(
            err.to_string(),
            "stale adapter token: generation 1 is not current (current: Some(2))"
        );
    }

    #[test]
    fn test_start_error_keeps_source() {
        use std::error::Error as _;

        let err = SupervisorError::Start {
            framework: "axum".to_string(),
            source: AdapterError::LocalAddr(io::Error::other("gone")),
        };
        assert!(err.source().is_some());
        assert!(err.to_string().starts_with("failed to start axum"));
    }
}
