//! Throttled log buffer
//!
//! Events land in a pending list as they arrive. A background task moves
//! them into the display ring buffer at most once per flush interval and
//! bumps a refresh generation, so a burst of events costs the display one
//! redraw.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use parking_lot::{Mutex, RwLock};
use tokio::sync::{watch, Notify};

use super::level::{LogLevel, Verbosity};

/// Default ring buffer capacity
pub const DEFAULT_CAPACITY: usize = 300;

/// Default flush interval
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(200);

/// One display log line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Position in arrival order, starting at 1
    pub seq: u64,
    pub timestamp: DateTime<Local>,
    pub level: LogLevel,
    pub message: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {}",
            self.timestamp.format("%H:%M:%S"),
            self.level,
            self.message
        )
    }
}

/// Log funnel configuration
#[derive(Debug, Clone)]
pub struct FunnelConfig {
    /// Maximum entries kept for display
    pub capacity: usize,

    /// Minimum time between flushes
    pub flush_interval: Duration,

    /// Initial display filter
    pub verbosity: Verbosity,
}

impl Default for FunnelConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            verbosity: Verbosity::Info,
        }
    }
}

impl FunnelConfig {
    /// Set the ring buffer capacity
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Set the flush interval
    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    /// Set the initial verbosity
    pub fn verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }
}

struct Inner {
    pending: Mutex<Vec<LogEntry>>,
    /// Only advanced under the `pending` lock
    next_seq: AtomicU64,
    entries: Mutex<VecDeque<LogEntry>>,
    verbosity: RwLock<Verbosity>,
    config: FunnelConfig,
    wake: Notify,
    refresh: watch::Sender<u64>,
}

/// Handle to the shared log funnel
///
/// Cheap to clone; all clones feed the same buffer.
#[derive(Clone)]
pub struct LogFunnel {
    inner: Arc<Inner>,
}

impl LogFunnel {
    /// Create a funnel with default configuration
    pub fn new() -> Self {
        Self::with_config(FunnelConfig::default())
    }

    /// Create a funnel with custom configuration
    pub fn with_config(config: FunnelConfig) -> Self {
        let (refresh, _) = watch::channel(0);

        Self {
            inner: Arc::new(Inner {
                pending: Mutex::new(Vec::new()),
                next_seq: AtomicU64::new(1),
                entries: Mutex::new(VecDeque::with_capacity(config.capacity)),
                verbosity: RwLock::new(config.verbosity),
                config,
                wake: Notify::new(),
                refresh,
            }),
        }
    }

    /// Get the funnel configuration
    pub fn config(&self) -> &FunnelConfig {
        &self.inner.config
    }

    /// Queue an event for the next flush
    ///
    /// Returns false if the verbosity filter dropped it.
    pub fn push(&self, level: LogLevel, message: impl Into<String>) -> bool {
        if !self.verbosity().allows(level) {
            return false;
        }

        let message = message.into();
        let mut pending = self.inner.pending.lock();
        pending.push(LogEntry {
            seq: self.inner.next_seq.fetch_add(1, Ordering::Relaxed),
            timestamp: Local::now(),
            level,
            message,
        });
        drop(pending);
        self.inner.wake.notify_one();
        true
    }

    /// Queue an event and flush right away, bypassing the throttle
    pub fn push_now(&self, level: LogLevel, message: impl Into<String>) -> bool {
        let accepted = self.push(level, message);
        if accepted {
            self.flush();
        }
        accepted
    }

    /// Move pending events into the display buffer
    ///
    /// Evicts the oldest entries past capacity. Signals a refresh when at
    /// least one entry moved. Returns the number of entries moved.
    pub fn flush(&self) -> usize {
        // Lock order: entries, then pending. Keeps the buffer in seq order
        // when flushes race.
        let moved = {
            let mut entries = self.inner.entries.lock();
            let batch = std::mem::take(&mut *self.inner.pending.lock());
            if batch.is_empty() {
                return 0;
            }

            let moved = batch.len();
            entries.extend(batch);
            let excess = entries.len().saturating_sub(self.inner.config.capacity);
            entries.drain(..excess);
            moved
        };

        self.inner.refresh.send_modify(|generation| *generation += 1);
        moved
    }

    /// Spawn the throttled flush task
    ///
    /// Returns a handle that can be used to abort the task.
    pub fn spawn_flush_task(&self) -> tokio::task::JoinHandle<()> {
        let funnel = self.clone();
        let interval = self.inner.config.flush_interval;

        tokio::spawn(async move {
            loop {
                funnel.inner.wake.notified().await;
                // Coalesce everything that arrives in this window
                tokio::time::sleep(interval).await;
                funnel.flush();
            }
        })
    }

    /// Most recent `count` entries, oldest first
    pub fn recent(&self, count: usize) -> Vec<LogEntry> {
        let entries = self.inner.entries.lock();
        let skip = entries.len().saturating_sub(count);
        entries.iter().skip(skip).cloned().collect()
    }

    /// Buffered entries with a sequence number above `seq`, oldest first
    ///
    /// Pass 0 for everything; pass the last seen `seq` to get only what
    /// arrived since.
    pub fn entries_after(&self, seq: u64) -> Vec<LogEntry> {
        let entries = self.inner.entries.lock();
        let start = entries.partition_point(|e| e.seq <= seq);
        entries.iter().skip(start).cloned().collect()
    }

    /// Number of entries in the display buffer
    pub fn len(&self) -> usize {
        self.inner.entries.lock().len()
    }

    /// Check whether the display buffer is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of events waiting for the next flush
    pub fn pending(&self) -> usize {
        self.inner.pending.lock().len()
    }

    /// Subscribe to refresh signals
    ///
    /// The value is the flush generation; it changes once per flush.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.refresh.subscribe()
    }

    /// Number of flushes that moved entries
    pub fn flush_count(&self) -> u64 {
        *self.inner.refresh.borrow()
    }

    /// Current display filter
    pub fn verbosity(&self) -> Verbosity {
        *self.inner.verbosity.read()
    }

    /// Replace the display filter
    pub fn set_verbosity(&self, verbosity: Verbosity) {
        *self.inner.verbosity.write() = verbosity;
    }

    /// Advance the display filter one step and return the new setting
    pub fn cycle_verbosity(&self) -> Verbosity {
        let mut verbosity = self.inner.verbosity.write();
        *verbosity = verbosity.next();
        *verbosity
    }
}

impl Default for LogFunnel {
    fn default() -> Self {
        Self::new()
    }
}
