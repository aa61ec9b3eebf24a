//! Frame registry implementation
//!
//! The live set of subscriber connections and the fan-out write over it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use futures::future::join_all;
use tokio::sync::Mutex;

use super::config::RegistryConfig;
use super::error::WriteError;
use super::sink::{ConnectionId, FrameSink};
use crate::stats::{BroadcastSnapshot, BroadcastStats};

/// Registry of live subscriber connections
///
/// Add, remove and fan-out all run under the same mutex, so a broadcast never
/// observes the set mid-mutation and a removed sink is never written to
/// again: removal takes the sink out of the map and closes it while the lock
/// is still held.
pub struct FrameRegistry {
    /// Live connections, each owned exclusively by the registry
    connections: Mutex<HashMap<ConnectionId, Box<dyn FrameSink>>>,

    /// Next connection id to hand out
    next_id: AtomicU64,

    /// Configuration
    config: RegistryConfig,

    /// Counters
    stats: BroadcastStats,
}

impl FrameRegistry {
    /// Create a new registry with default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a new registry with custom configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            config,
            stats: BroadcastStats::new(),
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Register a connection and take ownership of its sink
    pub async fn add(&self, sink: Box<dyn FrameSink>) -> ConnectionId {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));

        let mut connections = self.connections.lock().await;
        connections.insert(id, sink);
        self.stats.connection_opened();

        tracing::info!(
            connection_id = %id,
            connections = connections.len(),
            "Subscriber added"
        );

        id
    }

    /// Unregister a connection and close it
    ///
    /// Returns false if the connection was already gone (for example removed
    /// by a failed write).
    pub async fn remove(&self, id: ConnectionId) -> bool {
        let mut connections = self.connections.lock().await;

        match connections.remove(&id) {
            Some(sink) => {
                self.close_sink(sink).await;
                tracing::info!(
                    connection_id = %id,
                    connections = connections.len(),
                    "Subscriber removed"
                );
                true
            }
            None => false,
        }
    }

    /// Write a frame to every live connection
    ///
    /// Writes run concurrently, each bounded by the configured write deadline.
    /// A connection whose write fails or times out is removed and closed
    /// before this returns; the others still receive the frame. Returns the
    /// number of successful deliveries.
    pub async fn broadcast(&self, frame: Bytes) -> usize {
        let mut connections = self.connections.lock().await;
        let deadline = self.config.write_timeout;

        let results = join_all(connections.iter_mut().map(|(id, sink)| {
            let frame = frame.clone();
            async move {
                let result = match tokio::time::timeout(deadline, sink.send_frame(frame)).await {
                    Ok(result) => result,
                    Err(_) => Err(WriteError::Timeout(deadline)),
                };
                (*id, result)
            }
        }))
        .await;

        let mut delivered = 0;
        let mut failed = Vec::new();
        for (id, result) in results {
            match result {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::warn!(connection_id = %id, error = %e, "Frame write failed, dropping subscriber");
                    failed.push(id);
                }
            }
        }

        // The whole batch is bounded by one close deadline
        let removed: Vec<_> = failed.iter().filter_map(|id| connections.remove(id)).collect();
        join_all(removed.into_iter().map(|sink| self.close_sink(sink))).await;

        self.stats
            .record_frame(frame.len(), delivered as u64, failed.len() as u64);

        delivered
    }

    /// Remove and close every connection
    ///
    /// Returns the number of connections that were closed.
    pub async fn close_all(&self) -> usize {
        let mut connections = self.connections.lock().await;
        let drained: Vec<_> = connections.drain().collect();
        let count = drained.len();

        join_all(drained.into_iter().map(|(_, sink)| self.close_sink(sink))).await;

        if count > 0 {
            tracing::info!(closed = count, "All subscribers closed");
        }
        count
    }

    /// Check whether a connection is registered
    pub async fn contains(&self, id: ConnectionId) -> bool {
        self.connections.lock().await.contains_key(&id)
    }

    /// Number of live connections
    pub async fn len(&self) -> usize {
        self.connections.lock().await.len()
    }

    /// Check whether there are no live connections
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Get broadcast statistics
    pub fn stats(&self) -> BroadcastSnapshot {
        self.stats.snapshot()
    }

    async fn close_sink(&self, mut sink: Box<dyn FrameSink>) {
        self.stats.connection_closed();
        if tokio::time::timeout(self.config.close_timeout, sink.close())
            .await
            .is_err()
        {
            tracing::debug!("Subscriber close timed out");
        }
    }
}

impl Default for FrameRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::mpsc;

    use super::*;

    /// Sink that forwards frames into a channel
    struct ChannelSink {
        tx: mpsc::UnboundedSender<Bytes>,
        closed: Arc<AtomicBool>,
    }

    #[async_trait]
    impl FrameSink for ChannelSink {
        async fn send_frame(&mut self, frame: Bytes) -> Result<(), WriteError> {
            if self.closed.load(Ordering::SeqCst) {
                panic!("write after close");
            }
            self.tx.send(frame).map_err(|_| WriteError::Closed)
        }

        async fn close(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    /// Sink whose writes always fail
    struct BrokenSink {
        closed: Arc<AtomicBool>,
    }

    #[async_trait]
    impl FrameSink for BrokenSink {
        async fn send_frame(&mut self, _frame: Bytes) -> Result<(), WriteError> {
            Err(WriteError::Transport("broken pipe".into()))
        }

        async fn close(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    /// Sink whose writes never complete
    struct WedgedSink;

    #[async_trait]
    impl FrameSink for WedgedSink {
        async fn send_frame(&mut self, _frame: Bytes) -> Result<(), WriteError> {
            std::future::pending().await
        }

        async fn close(&mut self) {}
    }

    /// Sink whose writes fail and whose close never completes
    struct StuckSink;

    #[async_trait]
    impl FrameSink for StuckSink {
        async fn send_frame(&mut self, _frame: Bytes) -> Result<(), WriteError> {
            Err(WriteError::Closed)
        }

        async fn close(&mut self) {
            std::future::pending().await
        }
    }

    fn channel_sink() -> (Box<dyn FrameSink>, mpsc::UnboundedReceiver<Bytes>, Arc<AtomicBool>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));
        let sink = ChannelSink {
            tx,
            closed: Arc::clone(&closed),
        };
        (Box::new(sink), rx, closed)
    }

    #[tokio::test]
    async fn test_add_remove() {
        let registry = FrameRegistry::new();
        let (sink, _rx, closed) = channel_sink();

        let id = registry.add(sink).await;
        assert!(registry.contains(id).await);
        assert_eq!(registry.len().await, 1);

        assert!(registry.remove(id).await);
        assert!(registry.is_empty().await);
        assert!(closed.load(Ordering::SeqCst));

        // Second remove is a no-op
        assert!(!registry.remove(id).await);
    }

    #[tokio::test]
    async fn test_ids_are_unique() {
        let registry = FrameRegistry::new();
        let mut ids = HashSet::new();

        for _ in 0..10 {
            let (sink, _rx, _) = channel_sink();
            assert!(ids.insert(registry.add(sink).await));
        }

        assert_eq!(registry.len().await, 10);
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_connection() {
        let registry = FrameRegistry::new();
        let (a, mut rx_a, _) = channel_sink();
        let (b, mut rx_b, _) = channel_sink();
        registry.add(a).await;
        registry.add(b).await;

        let delivered = registry.broadcast(Bytes::from_static(b"frame-1")).await;

        assert_eq!(delivered, 2);
        assert_eq!(rx_a.recv().await.unwrap(), Bytes::from_static(b"frame-1"));
        assert_eq!(rx_b.recv().await.unwrap(), Bytes::from_static(b"frame-1"));
    }

    #[tokio::test]
    async fn test_sinks_share_the_frame_allocation() {
        let registry = FrameRegistry::new();
        let (a, mut rx_a, _) = channel_sink();
        let (b, mut rx_b, _) = channel_sink();
        registry.add(a).await;
        registry.add(b).await;

        let frame = Bytes::from(vec![7u8; 1024]);
        registry.broadcast(frame.clone()).await;

        assert_eq!(rx_a.recv().await.unwrap().as_ptr(), frame.as_ptr());
        assert_eq!(rx_b.recv().await.unwrap().as_ptr(), frame.as_ptr());
    }

    #[tokio::test]
    async fn test_failed_write_removes_only_that_connection() {
        let registry = FrameRegistry::new();
        let (good, mut rx, _) = channel_sink();
        let broken_closed = Arc::new(AtomicBool::new(false));

        let good_id = registry.add(good).await;
        let broken_id = registry
            .add(Box::new(BrokenSink {
                closed: Arc::clone(&broken_closed),
            }))
            .await;

        let delivered = registry.broadcast(Bytes::from_static(b"x")).await;

        assert_eq!(delivered, 1);
        assert!(registry.contains(good_id).await);
        assert!(!registry.contains(broken_id).await);
        assert!(broken_closed.load(Ordering::SeqCst));
        assert_eq!(rx.recv().await.unwrap(), Bytes::from_static(b"x"));

        let stats = registry.stats();
        assert_eq!(stats.write_failures, 1);
        assert_eq!(stats.deliveries, 1);
        assert_eq!(stats.connections_active, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wedged_connection_hits_deadline() {
        let config = RegistryConfig::default().write_timeout(Duration::from_millis(100));
        let registry = FrameRegistry::with_config(config);
        let (good, mut rx, _) = channel_sink();

        let good_id = registry.add(good).await;
        let wedged_id = registry.add(Box::new(WedgedSink)).await;

        let delivered = registry.broadcast(Bytes::from_static(b"frame")).await;

        assert_eq!(delivered, 1);
        assert!(registry.contains(good_id).await);
        assert!(!registry.contains(wedged_id).await);
        assert_eq!(rx.recv().await.unwrap(), Bytes::from_static(b"frame"));

        // Next broadcast no longer waits on the wedged peer
        let started = tokio::time::Instant::now();
        registry.broadcast(Bytes::from_static(b"next")).await;
        assert!(started.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_sinks_close_concurrently() {
        let config = RegistryConfig::default().close_timeout(Duration::from_millis(250));
        let registry = FrameRegistry::with_config(config);
        let (good, mut rx, _) = channel_sink();
        registry.add(good).await;
        for _ in 0..4 {
            registry.add(Box::new(StuckSink)).await;
        }

        let started = tokio::time::Instant::now();
        let delivered = registry.broadcast(Bytes::from_static(b"frame")).await;
        let elapsed = started.elapsed();

        assert_eq!(delivered, 1);
        assert_eq!(registry.len().await, 1);
        assert!(elapsed >= Duration::from_millis(250));
        assert!(elapsed < Duration::from_millis(500), "closes ran serially: {:?}", elapsed);
        assert_eq!(rx.recv().await.unwrap(), Bytes::from_static(b"frame"));
        assert_eq!(registry.stats().connections_active, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_all_is_bounded_by_one_deadline() {
        let config = RegistryConfig::default().close_timeout(Duration::from_millis(250));
        let registry = FrameRegistry::with_config(config);
        for _ in 0..4 {
            registry.add(Box::new(StuckSink)).await;
        }

        let started = tokio::time::Instant::now();
        assert_eq!(registry.close_all().await, 4);
        assert!(started.elapsed() < Duration::from_millis(500));
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_per_connection_order() {
        let registry = FrameRegistry::new();
        let (sink, mut rx, _) = channel_sink();
        registry.add(sink).await;

        for i in 0u8..20 {
            registry.broadcast(Bytes::from(vec![i])).await;
        }

        for i in 0u8..20 {
            assert_eq!(rx.recv().await.unwrap()[0], i);
        }
    }

    #[tokio::test]
    async fn test_removed_connection_not_written() {
        let registry = FrameRegistry::new();
        let (sink, mut rx, _) = channel_sink();
        let id = registry.add(sink).await;

        registry.remove(id).await;

        // ChannelSink panics on write after close
        assert_eq!(registry.broadcast(Bytes::from_static(b"late")).await, 0);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_add_remove() {
        let registry = Arc::new(FrameRegistry::new());
        let mut handles = Vec::new();

        // Each task adds two connections and removes one of them
        for _ in 0..32 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move {
                let (keep, keep_rx, _) = channel_sink();
                let (extra, _extra_rx, _) = channel_sink();
                let kept = registry.add(keep).await;
                let dropped = registry.add(extra).await;
                registry.broadcast(Bytes::from_static(b"tick")).await;
                assert!(registry.remove(dropped).await);
                (kept, keep_rx)
            }));
        }

        let mut kept = HashSet::new();
        let mut receivers = Vec::new();
        for handle in handles {
            let (id, rx) = handle.await.unwrap();
            kept.insert(id);
            receivers.push(rx);
        }

        assert_eq!(kept.len(), 32);
        assert_eq!(registry.len().await, 32);
        for id in kept {
            assert!(registry.contains(id).await);
        }
    }

    #[tokio::test]
    async fn test_close_all() {
        let registry = FrameRegistry::new();
        let (a, _rx_a, closed_a) = channel_sink();
        let (b, _rx_b, closed_b) = channel_sink();
        registry.add(a).await;
        registry.add(b).await;

        assert_eq!(registry.close_all().await, 2);
        assert!(registry.is_empty().await);
        assert!(closed_a.load(Ordering::SeqCst));
        assert!(closed_b.load(Ordering::SeqCst));

        assert_eq!(registry.broadcast(Bytes::from_static(b"x")).await, 0);
        assert_eq!(registry.stats().connections_active, 0);
    }
}
