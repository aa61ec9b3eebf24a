//! Log levels and the display verbosity filter

use std::fmt;
use std::str::FromStr;

/// Severity of a log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<tracing::Level> for LogLevel {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::ERROR => LogLevel::Error,
            tracing::Level::WARN => LogLevel::Warn,
            tracing::Level::INFO => LogLevel::Info,
            _ => LogLevel::Debug,
        }
    }
}

/// Which entries reach the display log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Errors only
    Error,
    /// Everything except debug
    #[default]
    Info,
    /// Everything
    Debug,
}

impl Verbosity {
    /// Check whether an entry at `level` passes this filter
    pub fn allows(&self, level: LogLevel) -> bool {
        match self {
            Verbosity::Error => level == LogLevel::Error,
            Verbosity::Info => level != LogLevel::Debug,
            Verbosity::Debug => true,
        }
    }

    /// Next setting in the `Error -> Info -> Debug -> Error` cycle
    pub fn next(&self) -> Self {
        match self {
            Verbosity::Error => Verbosity::Info,
            Verbosity::Info => Verbosity::Debug,
            Verbosity::Debug => Verbosity::Error,
        }
    }
}

impl fmt::Display for Verbosity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verbosity::Error => write!(f, "ERROR"),
            Verbosity::Info => write!(f, "INFO"),
            Verbosity::Debug => write!(f, "DEBUG"),
        }
    }
}

impl FromStr for Verbosity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Ok(Verbosity::Error),
            "info" => Ok(Verbosity::Info),
            "debug" => Ok(Verbosity::Debug),
            other => Err(format!("unknown verbosity: {}", other)),
        }
    }
}
