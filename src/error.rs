//! Crate-level error type
//!
//! Module errors stay specific at their own boundary; this enum is for
//! callers that drive several subsystems at once (the binary, `quit`).

use crate::config::ConfigError;
use crate::device::{DiscoveryError, OpenError, StreamError};
use crate::registry::WriteError;
use crate::server::ServerError;

/// Any error produced by this crate
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    Open(#[from] OpenError),

    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error(transparent)]
    Server(#[from] ServerError),

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("logging setup failed: {0}")]
    Logging(#[from] tracing_subscriber::util::TryInitError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias using the crate error
pub type Result<T> = std::result::Result<T, Error>;
