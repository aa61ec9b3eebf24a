//! Subscriber connection handle
//!
//! A [`FrameSink`] is the write half of one client's duplex channel. Once
//! added to the registry it is owned by the registry; nothing else can write
//! to it.

use async_trait::async_trait;
use bytes::Bytes;

use super::error::WriteError;

/// Identifier assigned to a connection when it joins the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub(super) u64);

impl ConnectionId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Outbound half of a subscriber connection
#[async_trait]
pub trait FrameSink: Send {
    /// Write one frame as a single message
    async fn send_frame(&mut self, frame: Bytes) -> Result<(), WriteError>;

    /// Close the connection
    async fn close(&mut self);
}
