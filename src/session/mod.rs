//! Camera setup session
//!
//! ```text
//!   NoDeviceConfigured ──scan──► Scanning ──► SelectingDevice ──confirm──► TestingDevice
//!          ▲                        │          │  ▲ up/down                     │
//!          └──── no devices / error ┘          │  └─────┘                       │ confirm
//!          ▲                                   │                               ▼
//!          └──────────────── back ─────────────┘                           Complete ◄─┐
//!          ▲                                                                  │       │
//!          └───────────────────────── reset (configured) ─────────────────────┤ confirm
//!                                                                             └───────┘
//! ```
//!
//! `TestingDevice` and `Complete` make sure a forwarding task runs for the
//! device; reset and close cancel it.

pub mod forwarder;
pub mod machine;
pub mod step;

pub use forwarder::Forwarders;
pub use machine::{CameraMessage, CameraSession, MAX_CAMERA_MESSAGES};
pub use step::{SessionEvent, SetupStep};
