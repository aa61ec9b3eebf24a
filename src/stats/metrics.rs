//! Counters for the broadcast path

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Live broadcast counters
///
/// Updated from the registry and the connection handlers without taking the
/// registry lock.
#[derive(Debug)]
pub struct BroadcastStats {
    started_at: Instant,
    frames: AtomicU64,
    bytes: AtomicU64,
    deliveries: AtomicU64,
    write_failures: AtomicU64,
    connections_total: AtomicU64,
    connections_active: AtomicU64,
}

impl BroadcastStats {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            frames: AtomicU64::new(0),
            bytes: AtomicU64::new(0),
            deliveries: AtomicU64::new(0),
            write_failures: AtomicU64::new(0),
            connections_total: AtomicU64::new(0),
            connections_active: AtomicU64::new(0),
        }
    }

    pub(crate) fn record_frame(&self, size: usize, delivered: u64, failed: u64) {
        self.frames.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(size as u64, Ordering::Relaxed);
        self.deliveries.fetch_add(delivered, Ordering::Relaxed);
        self.write_failures.fetch_add(failed, Ordering::Relaxed);
    }

    pub(crate) fn connection_opened(&self) {
        self.connections_total.fetch_add(1, Ordering::Relaxed);
        self.connections_active.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn connection_closed(&self) {
        self.connections_active.fetch_sub(1, Ordering::Relaxed);
    }

    /// Take a point-in-time copy of the counters
    pub fn snapshot(&self) -> BroadcastSnapshot {
        BroadcastSnapshot {
            frames: self.frames.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
            connections_total: self.connections_total.load(Ordering::Relaxed),
            connections_active: self.connections_active.load(Ordering::Relaxed),
            uptime: self.started_at.elapsed(),
        }
    }
}

impl Default for BroadcastStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Copy of the broadcast counters
#[derive(Debug, Clone, Default)]
pub struct BroadcastSnapshot {
    /// Frames handed to `broadcast`
    pub frames: u64,
    /// Payload bytes handed to `broadcast`
    pub bytes: u64,
    /// Successful per-connection writes
    pub deliveries: u64,
    /// Failed or timed-out per-connection writes
    pub write_failures: u64,
    /// Connections ever registered
    pub connections_total: u64,
    /// Connections currently registered
    pub connections_active: u64,
    /// Time since the counters were created
    pub uptime: Duration,
}

impl BroadcastSnapshot {
    /// Outbound bitrate estimate in bits per second
    pub fn bitrate(&self) -> u64 {
        let secs = self.uptime.as_secs();
        if secs > 0 {
            (self.bytes * 8) / secs
        } else {
            0
        }
    }

    /// Average frames per second since start
    pub fn framerate(&self) -> f64 {
        let secs = self.uptime.as_secs_f64();
        if secs > 0.0 {
            self.frames as f64 / secs
        } else {
            0.0
        }
    }
}
