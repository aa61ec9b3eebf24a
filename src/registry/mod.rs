//! Broadcast registry for subscriber fan-out
//!
//! The registry owns every live subscriber connection and writes each frame
//! handed to it to all of them. One mutex guards the connection map; add,
//! remove and the fan-out write all take it.
//!
//! # Architecture
//!
//! ```text
//!                          Arc<FrameRegistry>
//!                     ┌─────────────────────────┐
//!                     │ connections: Mutex<     │
//!                     │   HashMap<ConnectionId, │
//!                     │     Box<dyn FrameSink>> │
//!                     │ >                       │
//!                     └───────────┬─────────────┘
//!                                 │
//!         ┌───────────────────────┼───────────────────────┐
//!         │                       │                       │
//!         ▼                       ▼                       ▼
//!  [Forwarding task]        [Connection]            [Connection]
//!  frames.next()            liveness read           liveness read
//!         │                       ▲                       ▲
//!         └──► registry.broadcast()──► send_frame() ──────┘
//! ```
//!
//! # Failure isolation
//!
//! Every write runs under its own deadline. A connection whose write fails or
//! times out is removed and closed in the same critical section; the other
//! connections still get the frame.
//!
//! # Frame Sharing
//!
//! Frames are `bytes::Bytes`, so the fan-out hands each sink a
//! reference-counted handle to the same allocation. Whether a sink copies
//! from there is up to its transport: the websocket sink copies once per
//! subscriber because axum's `Message::Binary` owns a `Vec<u8>`.

pub mod config;
pub mod error;
pub mod sink;
pub mod store;

pub use config::RegistryConfig;
pub use error::WriteError;
pub use sink::{ConnectionId, FrameSink};
pub use store::FrameRegistry;
