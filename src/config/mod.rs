//! Persisted application configuration
//!
//! One JSON record holding the committed camera and the server endpoint.
//! Missing fields fall back to defaults, so older or hand-edited files keep
//! loading.

pub mod error;
pub mod store;

use serde::{Deserialize, Deserializer, Serialize};

use crate::device::{Device, StreamConfig};

pub use error::ConfigError;
pub use store::{ConfigStore, JsonConfigStore, MemoryConfigStore};

/// Device name stored when no camera has been committed
pub const UNCONFIGURED_DEVICE_NAME: &str = "No Camera Configured";

/// Capture parameters of the committed camera
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamSettings {
    /// `WIDTHxHEIGHT`
    pub resolution: String,
    pub fps: u32,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            resolution: "640x480".to_string(),
            fps: 30,
        }
    }
}

impl StreamSettings {
    /// Parse the resolution string into `(width, height)`
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        let (w, h) = self.resolution.split_once('x')?;
        Some((w.trim().parse().ok()?, h.trim().parse().ok()?))
    }

    /// Build an open request from these settings
    ///
    /// Falls back to the default resolution if the stored one is malformed.
    pub fn stream_config(&self) -> StreamConfig {
        let default = StreamConfig::default();
        let (width, height) = self.dimensions().unwrap_or((default.width, default.height));
        StreamConfig {
            width,
            height,
            framerate: self.fps,
            ..default
        }
    }
}

impl From<&StreamConfig> for StreamSettings {
    fn from(config: &StreamConfig) -> Self {
        Self {
            resolution: config.resolution(),
            fps: config.framerate,
        }
    }
}

/// The committed camera
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub device_name: String,
    pub device_id: String,
    pub stream_config: StreamSettings,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device_name: UNCONFIGURED_DEVICE_NAME.to_string(),
            device_id: "0".to_string(),
            stream_config: StreamSettings::default(),
        }
    }
}

impl CameraConfig {
    /// Record for a device opened with `config`
    pub fn for_device(device: &Device, config: &StreamConfig) -> Self {
        Self {
            device_name: device.name.clone(),
            device_id: device.id.clone(),
            stream_config: StreamSettings::from(config),
        }
    }

    /// A camera counts as configured once a real device has been committed
    pub fn is_configured(&self) -> bool {
        self.device_name != UNCONFIGURED_DEVICE_NAME && !self.device_id.is_empty()
    }
}

/// Top-level persisted record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(deserialize_with = "port_from_any")]
    pub server_port: u16,
    pub server_ip: String,
    pub camera: CameraConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_port: crate::server::config::DEFAULT_PORT,
            server_ip: "localhost".to_string(),
            camera: CameraConfig::default(),
        }
    }
}

/// Accept the port as a number or a numeric string
fn port_from_any<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Number(u16),
        Text(String),
    }

    match Port::deserialize(deserializer)? {
        Port::Number(port) => Ok(port),
        Port::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
    }
}
