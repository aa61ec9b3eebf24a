//! perchcam: camera setup wizard with a websocket frame broadcaster
//!
//! A [`CameraSession`] walks the operator through discovering, testing and
//! committing a capture device. Once a device streams, its frames are pushed
//! through a [`BroadcastServer`] to every connected websocket client.
//!
//! ```text
//!   FrameSource ──frames()──► forwarding task ──► BroadcastServer::broadcast
//!        ▲                                               │
//!        │ scan/open/close                     FrameRegistry fan-out
//!        │                                               │
//!   CameraSession ◄── SessionEvent            ws client  ws client  ...
//! ```
//!
//! Status events go through `tracing`; [`logging::init`] installs a layer
//! that funnels them into a throttled display buffer.

pub mod config;
pub mod device;
pub mod error;
pub mod logging;
pub mod registry;
pub mod server;
pub mod session;
pub mod stats;

pub use config::{AppConfig, ConfigStore, JsonConfigStore};
pub use device::{Device, FrameSource, StreamConfig, TestPatternSource};
pub use error::{Error, Result};
pub use logging::{LogFunnel, Verbosity};
pub use registry::FrameRegistry;
pub use server::{BroadcastServer, ServerConfig};
pub use session::{CameraSession, SessionEvent, SetupStep};
