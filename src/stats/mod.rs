//! Statistics for the broadcast path

pub mod metrics;

pub use metrics::{BroadcastSnapshot, BroadcastStats};
