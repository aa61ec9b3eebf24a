//! Frame broadcast server
//!
//! An axum HTTP endpoint with one websocket upgrade route (`/ws/camera` by
//! default). Each upgraded connection becomes a [`FrameRegistry`] member and
//! gets a task that only watches for disconnect; the server never reads
//! application data from clients.
//!
//! ```text
//!   start() ──► bind ──► spawn accept loop ──► Ok(local_addr)
//!                              │
//!                              ├── GET /ws/camera ──► on_upgrade ──► registry.add()
//!                              │                           │
//!                              │                    read until disconnect
//!                              │                           │
//!                              │                    registry.remove()
//!                              │
//!   stop(timeout) ──► signal ──┴── graceful drain ─(timeout)─► abort ──► registry.close_all()
//! ```
//!
//! [`FrameRegistry`]: crate::registry::FrameRegistry

pub mod config;
pub mod connection;
pub mod error;
pub mod listener;
mod pages;

pub use config::ServerConfig;
pub use connection::WsSink;
pub use error::ServerError;
pub use listener::BroadcastServer;
