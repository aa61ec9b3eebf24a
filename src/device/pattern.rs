//! Synthetic frame source
//!
//! Exposes a single virtual device that emits numbered frames at the
//! configured framerate. Lets the wizard and the broadcast server run on a
//! machine without a camera.

use std::collections::HashMap;
use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::watch;

use super::{
    Device, DeviceType, DiscoveryError, FrameSource, FrameStream, OpenError, StreamConfig,
    StreamError,
};

/// Magic prefix of every synthetic frame
pub const PATTERN_MAGIC: &[u8; 4] = b"PCAM";

/// Device id of the virtual device
pub const PATTERN_DEVICE_ID: &str = "pattern-0";

struct OpenDevice {
    config: StreamConfig,
    closed: watch::Sender<bool>,
}

/// Frame source backed by a generated test pattern
pub struct TestPatternSource {
    devices: Vec<Device>,
    open: Mutex<HashMap<String, OpenDevice>>,
}

impl TestPatternSource {
    pub fn new() -> Self {
        Self {
            devices: vec![Device::new(
                PATTERN_DEVICE_ID,
                "Test Pattern",
                DeviceType::Virtual,
            )],
            open: Mutex::new(HashMap::new()),
        }
    }

    /// Check whether a device is currently open
    pub fn is_open(&self, device_id: &str) -> bool {
        self.open.lock().contains_key(device_id)
    }
}

impl Default for TestPatternSource {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSource for TestPatternSource {
    fn scan(&self) -> Result<Vec<Device>, DiscoveryError> {
        Ok(self.devices.clone())
    }

    fn open(&self, device_id: &str, config: StreamConfig) -> Result<(), OpenError> {
        if !self.devices.iter().any(|d| d.id == device_id) {
            return Err(OpenError::NotFound(device_id.to_string()));
        }

        let mut open = self.open.lock();
        if let Some(previous) = open.get(device_id) {
            // Reopen ends the streams handed out under the old parameters
            let _ = previous.closed.send(true);
        }

        let (closed, _) = watch::channel(false);
        open.insert(device_id.to_string(), OpenDevice { config, closed });

        tracing::debug!(device = device_id, resolution = %config.resolution(), "Pattern device opened");
        Ok(())
    }

    fn frames(&self, device_id: &str) -> Result<FrameStream, StreamError> {
        let open = self.open.lock();
        let device = open
            .get(device_id)
            .ok_or_else(|| StreamError::NotOpen(device_id.to_string()))?;

        let config = device.config;
        let period = Duration::from_secs(1) / config.framerate.max(1);
        let closed = device.closed.subscribe();

        let stream = futures::stream::unfold((closed, 0u64), move |(mut closed, seq)| async move {
            tokio::select! {
                _ = tokio::time::sleep(period) => {}
                _ = wait_closed(&mut closed) => return None,
            }
            Some((pattern_frame(seq, &config), (closed, seq + 1)))
        });

        Ok(stream.boxed())
    }

    fn close(&self, device_id: &str) -> Result<(), OpenError> {
        match self.open.lock().remove(device_id) {
            Some(device) => {
                let _ = device.closed.send(true);
                tracing::debug!(device = device_id, "Pattern device closed");
                Ok(())
            }
            None => Err(OpenError::NotFound(device_id.to_string())),
        }
    }
}

async fn wait_closed(closed: &mut watch::Receiver<bool>) {
    // A dropped sender also counts as closed
    let _ = closed.wait_for(|c| *c).await;
}

/// Build one synthetic frame: magic, sequence number, width, height
fn pattern_frame(seq: u64, config: &StreamConfig) -> Bytes {
    let mut buf = BytesMut::with_capacity(16);
    buf.put_slice(PATTERN_MAGIC);
    buf.put_u64(seq);
    buf.put_u16(config.width as u16);
    buf.put_u16(config.height as u16);
    buf.freeze()
}
