//! Shared, mutable log level.
//!
//! [`LogLevelControl`] is the only piece of state every adapter mutates
//! concurrently (through `GET /logger`). It is a cloneable handle over an
//! atomic cell; the logging subscriber reads it on every event.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Log verbosity levels, most verbose first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Very fine-grained diagnostics.
    Trace,
    /// Diagnostics useful while debugging.
    Debug,
    /// Normal operational messages.
    Info,
    /// Something unexpected that the service recovered from.
    Warn,
    /// Failures.
    Error,
}

/// Error returned by the strict [`FromStr`] implementation of [`LogLevel`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown log level: {0}")]
pub struct ParseLevelError(pub String);

impl LogLevel {
    /// Default level used when a value cannot be parsed.
    pub const DEFAULT: Self = Self::Info;

    /// Parses a level, falling back to [`LogLevel::DEFAULT`] for anything
    /// unrecognised.
    ///
    /// ```
    /// use janus_core::LogLevel;
    ///
    /// assert_eq!(LogLevel::parse_lossy("DEBUG"), LogLevel::Debug);
    /// assert_eq!(LogLevel::parse_lossy("loud"), LogLevel::Info);
    /// ```
    #[must_use]
    pub fn parse_lossy(value: &str) -> Self {
        value.parse().unwrap_or(Self::DEFAULT)
    }

    /// Returns the lowercase level name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// Converts to the equivalent `tracing` level.
    #[must_use]
    pub const fn as_tracing(&self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }

    const fn to_u8(self) -> u8 {
        self as u8
    }

    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Trace,
            1 => Self::Debug,
            2 => Self::Info,
            3 => Self::Warn,
            _ => Self::Error,
        }
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(ParseLevelError(s.to_string())),
        }
    }
}

/// Cloneable handle to a shared log level.
///
/// All clones observe and mutate the same value.
///
/// ```
/// use janus_core::{LogLevel, LogLevelControl};
///
/// let control = LogLevelControl::new(LogLevel::Info);
/// let shared = control.clone();
///
/// let previous = shared.set(LogLevel::Debug);
/// assert_eq!(previous, LogLevel::Info);
/// assert_eq!(control.level(), LogLevel::Debug);
/// ```
#[derive(Debug, Clone)]
pub struct LogLevelControl {
    level: Arc<AtomicU8>,
}

impl LogLevelControl {
    /// Creates a control holding `level`.
    #[must_use]
    pub fn new(level: LogLevel) -> Self {
        Self {
            level: Arc::new(AtomicU8::new(level.to_u8())),
        }
    }

    /// Returns the current level.
    #[must_use]
    pub fn level(&self) -> LogLevel {
        LogLevel::from_u8(self.level.load(Ordering::Acquire))
    }

    /// Sets a new level and returns the previous one.
    pub fn set(&self, level: LogLevel) -> LogLevel {
        LogLevel::from_u8(self.level.swap(level.to_u8(), Ordering::AcqRel))
    }

    /// Returns `true` if events at `level` should be emitted.
    #[must_use]
    pub fn enabled(&self, level: &tracing::Level) -> bool {
        // tracing orders levels by verbosity: TRACE > DEBUG > ... > ERROR
        *level <= self.level().as_tracing()
    }
}

impl Default for LogLevelControl {
    fn default() -> Self {
        Self::new(LogLevel::DEFAULT)
    }
}
