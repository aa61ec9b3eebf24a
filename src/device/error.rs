//! Frame source error types

/// Device discovery failed
#[derive(Debug, Clone, thiserror::Error)]
#[error("device discovery failed: {0}")]
pub struct DiscoveryError(pub String);

/// A device could not be opened or closed
#[derive(Debug, Clone, thiserror::Error)]
pub enum OpenError {
    /// No device with this id
    #[error("device not found: {0}")]
    NotFound(String),
    /// Device is held by another process
    #[error("device busy: {0}")]
    Busy(String),
    /// Driver-level failure
    #[error("device {device}: {reason}")]
    Driver { device: String, reason: String },
}

/// The frame sequence of a device is unavailable
#[derive(Debug, Clone, thiserror::Error)]
pub enum StreamError {
    /// `frames` was called for a device that is not open
    #[error("device not open: {0}")]
    NotOpen(String),
    /// Driver-level failure
    #[error("stream for {device} unavailable: {reason}")]
    Unavailable { device: String, reason: String },
}
