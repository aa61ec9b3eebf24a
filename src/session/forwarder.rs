//! Forwarding tasks
//!
//! A forwarding task pulls frames from one device's [`FrameStream`] and hands
//! each to the broadcast server. At most one task runs per device id.

use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt;
use tokio::task::JoinHandle;

use crate::device::FrameStream;
use crate::server::BroadcastServer;

/// Set of running forwarding tasks, keyed by device id
///
/// Dropping the set aborts every task in it.
#[derive(Default)]
pub struct Forwarders {
    tasks: HashMap<String, JoinHandle<()>>,
}

impl Forwarders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether a task for `device_id` is still running
    ///
    /// A task whose stream ended counts as not running.
    pub fn is_running(&self, device_id: &str) -> bool {
        self.tasks
            .get(device_id)
            .is_some_and(|task| !task.is_finished())
    }

    /// Start forwarding `frames` for `device_id`
    ///
    /// Returns false and drops `frames` if a task for the device is already
    /// running.
    pub fn spawn(
        &mut self,
        device_id: &str,
        frames: FrameStream,
        server: Arc<BroadcastServer>,
    ) -> bool {
        if self.is_running(device_id) {
            return false;
        }

        let task = tokio::spawn(forward(device_id.to_string(), frames, server));
        self.tasks.insert(device_id.to_string(), task);
        true
    }

    /// Abort the task for `device_id`
    pub fn cancel(&mut self, device_id: &str) -> bool {
        match self.tasks.remove(device_id) {
            Some(task) => {
                task.abort();
                tracing::debug!(device = device_id, "Forwarding cancelled");
                true
            }
            None => false,
        }
    }

    /// Abort every task and return how many were running
    pub fn cancel_all(&mut self) -> usize {
        let count = self.active();
        for (_, task) in self.tasks.drain() {
            task.abort();
        }
        count
    }

    /// Number of tasks still running
    pub fn active(&self) -> usize {
        self.tasks.values().filter(|t| !t.is_finished()).count()
    }
}

impl Drop for Forwarders {
    fn drop(&mut self) {
        for task in self.tasks.values() {
            task.abort();
        }
    }
}

async fn forward(device_id: String, mut frames: FrameStream, server: Arc<BroadcastServer>) {
    tracing::info!(device = %device_id, "Camera stream started");

    let mut forwarded = 0u64;
    while let Some(frame) = frames.next().await {
        server.broadcast(frame).await;
        forwarded += 1;
    }

    tracing::info!(device = %device_id, frames = forwarded, "Camera stream ended");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::ServerConfig;
    use bytes::Bytes;
    use futures::stream;

    fn server() -> Arc<BroadcastServer> {
        Arc::new(BroadcastServer::new(ServerConfig::default()))
    }

    #[tokio::test]
    async fn test_one_task_per_device() {
        let mut forwarders = Forwarders::new();

        assert!(forwarders.spawn("cam", stream::pending().boxed(), server()));
        assert!(!forwarders.spawn("cam", stream::pending().boxed(), server()));
        assert!(forwarders.spawn("other", stream::pending().boxed(), server()));
        assert_eq!(forwarders.active(), 2);

        assert_eq!(forwarders.cancel_all(), 2);
        assert_eq!(forwarders.active(), 0);
    }

    #[tokio::test]
    async fn test_finished_stream_allows_restart() {
        let mut forwarders = Forwarders::new();
        let frames = stream::iter(vec![Bytes::from_static(b"a"), Bytes::from_static(b"b")]);

        forwarders.spawn("cam", frames.boxed(), server());
        for _ in 0..10 {
            if !forwarders.is_running("cam") {
                break;
            }
            tokio::task::yield_now().await;
        }

        assert!(!forwarders.is_running("cam"));
        assert!(forwarders.spawn("cam", stream::pending().boxed(), server()));
        assert!(forwarders.cancel("cam"));
        assert!(!forwarders.cancel("cam"));
    }
}
