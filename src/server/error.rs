//! Server lifecycle errors

use std::net::SocketAddr;

/// Error type for broadcast server lifecycle calls
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// `start` called while the listener is bound
    #[error("server is already running")]
    AlreadyRunning,
    /// `stop` called while the listener is not bound
    #[error("server is not running")]
    NotRunning,
    /// The listening socket could not be bound
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    /// The port cannot change while the listener is bound
    #[error("cannot change port while server is running")]
    PortLocked,
}
