//! Registry error types
//!
//! Write failures are per-connection. The registry turns them into a removal
//! and keeps delivering to everyone else.

use std::time::Duration;

/// Error type for a single outbound frame write
#[derive(Debug, Clone, thiserror::Error)]
pub enum WriteError {
    /// Peer already went away
    #[error("connection closed")]
    Closed,
    /// Write did not finish within the per-write deadline
    #[error("write timed out after {0:?}")]
    Timeout(Duration),
    /// Transport-level failure
    #[error("transport error: {0}")]
    Transport(String),
}
