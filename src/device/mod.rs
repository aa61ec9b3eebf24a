//! Capture device types and the frame source contract
//!
//! The physical driver (enumeration, capture, JPEG encoding) lives behind the
//! [`FrameSource`] trait. The session state machine only ever talks to a
//! `FrameSource`; it never touches hardware directly.
//!
//! ```text
//!   FrameSource::scan()    ──► Vec<Device>
//!   FrameSource::open()    ──► device ready
//!   FrameSource::frames()  ──► FrameStream (lazy, unbounded, not restartable)
//!   FrameSource::close()   ──► FrameStream ends
//! ```

pub mod error;
pub mod pattern;

use std::fmt;

use bytes::Bytes;
use futures::stream::BoxStream;

pub use error::{DiscoveryError, OpenError, StreamError};
pub use pattern::TestPatternSource;

/// Kind of capture device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceType {
    /// External USB camera
    Usb,
    /// Camera built into the host (laptop webcam, Pi camera module)
    BuiltIn,
    /// Software device
    Virtual,
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceType::Usb => write!(f, "usb"),
            DeviceType::BuiltIn => write!(f, "built-in"),
            DeviceType::Virtual => write!(f, "virtual"),
        }
    }
}

/// A discoverable capture device
///
/// Produced by discovery and never mutated afterwards. Two devices are equal
/// when their ids are equal.
#[derive(Debug, Clone)]
pub struct Device {
    /// Stable handle used for every later call to the frame source
    pub id: String,
    /// Display label
    pub name: String,
    /// Whether the device can currently be opened
    pub is_available: bool,
    pub device_type: DeviceType,
}

impl Device {
    pub fn new(id: impl Into<String>, name: impl Into<String>, device_type: DeviceType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            is_available: true,
            device_type,
        }
    }
}

impl PartialEq for Device {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Device {}

impl std::hash::Hash for Device {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// UI surface that accompanies a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamMode {
    /// Not streaming
    Off,
    /// Plain stream to connected clients
    #[default]
    Streaming,
    /// Stream watched from the live monitor page
    LiveMonitor,
    /// Stream used for manual focusing
    Focus,
    /// Unattended monitoring
    AutoMonitor,
}

/// Requested capture parameters
///
/// Built by the session when a device is opened and passed by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConfig {
    pub width: u32,
    pub height: u32,
    pub framerate: u32,
    pub mode: StreamMode,
}

impl StreamConfig {
    pub fn new(width: u32, height: u32, framerate: u32, mode: StreamMode) -> Self {
        Self {
            width,
            height,
            framerate,
            mode,
        }
    }

    /// Resolution formatted as `WIDTHxHEIGHT`
    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self::new(640, 480, 30, StreamMode::Streaming)
    }
}

/// Lazy sequence of encoded frames for one opened device
///
/// Ends when the device is closed or disconnected. A finished stream cannot be
/// restarted; call [`FrameSource::frames`] again.
pub type FrameStream = BoxStream<'static, Bytes>;

/// Capability interface to the capture driver
pub trait FrameSource: Send + Sync {
    /// Enumerate available devices
    fn scan(&self) -> Result<Vec<Device>, DiscoveryError>;

    /// Open a device with the given capture parameters
    fn open(&self, device_id: &str, config: StreamConfig) -> Result<(), OpenError>;

    /// Acquire the frame sequence of an opened device
    fn frames(&self, device_id: &str) -> Result<FrameStream, StreamError>;

    /// Close a device, ending any frame sequence acquired from it
    fn close(&self, device_id: &str) -> Result<(), OpenError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_equality_by_id() {
        let a = Device::new("0", "FaceTime HD", DeviceType::BuiltIn);
        let mut b = Device::new("0", "Renamed", DeviceType::Usb);
        b.is_available = false;
        let c = Device::new("1", "FaceTime HD", DeviceType::BuiltIn);

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_default_stream_config() {
        let config = StreamConfig::default();

        assert_eq!(config.width, 640);
        assert_eq!(config.height, 480);
        assert_eq!(config.framerate, 30);
        assert_eq!(config.mode, StreamMode::Streaming);
        assert_eq!(config.resolution(), "640x480");
    }
}
