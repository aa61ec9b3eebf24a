//! Camera session state machine
//!
//! Drives discovery, selection, testing and commit of the capture device and
//! owns the forwarding tasks that feed the broadcast server.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Local};

use super::forwarder::Forwarders;
use super::step::{SessionEvent, SetupStep};
use crate::config::{AppConfig, CameraConfig, ConfigStore};
use crate::device::{Device, FrameSource, StreamConfig, StreamError};
use crate::error::Result;
use crate::server::{BroadcastServer, ServerError};

/// Number of operator messages kept
pub const MAX_CAMERA_MESSAGES: usize = 10;

/// Operator-facing note about the camera
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraMessage {
    pub timestamp: DateTime<Local>,
    pub text: String,
    pub is_error: bool,
}

/// Camera setup wizard
///
/// Transitions take `&mut self`, so one owner drives the session and
/// transitions never interleave. At most one device is open at a time; opening
/// another closes the first.
pub struct CameraSession {
    source: Arc<dyn FrameSource>,
    server: Arc<BroadcastServer>,
    store: Arc<dyn ConfigStore>,
    config: AppConfig,

    step: SetupStep,
    status: String,
    configured: bool,

    devices: Vec<Device>,
    selected: Option<Device>,
    open_device: Option<String>,

    forwarders: Forwarders,
    last_stream_error: Option<String>,
    messages: VecDeque<CameraMessage>,
}

impl CameraSession {
    /// Create a session from a loaded configuration
    ///
    /// Starts in `Complete` if the record holds a valid camera.
    pub fn new(
        source: Arc<dyn FrameSource>,
        server: Arc<BroadcastServer>,
        store: Arc<dyn ConfigStore>,
        config: AppConfig,
    ) -> Self {
        let configured = config.camera.is_configured();
        let (step, status) = if configured {
            (SetupStep::Complete, "Camera is configured!")
        } else {
            (SetupStep::NoDeviceConfigured, "Starting up...")
        };

        Self {
            source,
            server,
            store,
            config,
            step,
            status: status.to_string(),
            configured,
            devices: Vec::new(),
            selected: None,
            open_device: None,
            forwarders: Forwarders::new(),
            last_stream_error: None,
            messages: VecDeque::with_capacity(MAX_CAMERA_MESSAGES),
        }
    }

    /// Apply one input event and return the resulting step
    ///
    /// Events that mean nothing in the current step are ignored. Must run
    /// inside a Tokio runtime; forwarding tasks are spawned on it.
    pub fn handle(&mut self, event: SessionEvent) -> SetupStep {
        tracing::debug!(step = %self.step, event = ?event, "Session event");

        match (self.step, event) {
            (SetupStep::NoDeviceConfigured, SessionEvent::Scan) => self.scan(),
            (SetupStep::SelectingDevice, SessionEvent::Up) => self.navigate(-1),
            (SetupStep::SelectingDevice, SessionEvent::Down) => self.navigate(1),
            (SetupStep::SelectingDevice, SessionEvent::Confirm) => self.start_test(),
            (SetupStep::TestingDevice | SetupStep::ConfiguringDevice, SessionEvent::Confirm) => {
                self.commit()
            }
            (SetupStep::Complete, SessionEvent::Confirm) => self.resume(),
            (SetupStep::SelectingDevice, SessionEvent::Back) => {
                self.step = SetupStep::NoDeviceConfigured;
            }
            (SetupStep::ConfiguringDevice, SessionEvent::Back) => {
                self.step = SetupStep::TestingDevice;
            }
            (_, SessionEvent::Reset) if self.configured => self.reset(),
            _ => {}
        }

        if !self.step.is_streaming_capable() && self.forwarders.active() > 0 {
            tracing::warn!(step = %self.step, "Forwarding outside a streaming step, closing camera");
            self.close_device();
        }

        self.step
    }

    fn scan(&mut self) {
        self.step = SetupStep::Scanning;
        self.status = "Scanning for cameras...".to_string();
        tracing::info!("Scanning for cameras");

        match self.source.scan() {
            Ok(devices) if devices.is_empty() => {
                tracing::info!("No cameras found");
                self.devices.clear();
                self.selected = None;
                self.status = "No cameras found".to_string();
                self.step = SetupStep::NoDeviceConfigured;
            }
            Ok(devices) => {
                tracing::info!(count = devices.len(), "Cameras found");
                self.selected = devices.first().cloned();
                self.devices = devices;
                self.status = "Select a camera to configure".to_string();
                self.step = SetupStep::SelectingDevice;
            }
            Err(e) => {
                tracing::error!(error = %e, "Camera scan failed");
                self.add_message(format!("Error scanning for cameras: {}", e), true);
                self.step = SetupStep::NoDeviceConfigured;
            }
        }
    }

    fn navigate(&mut self, offset: isize) {
        let len = self.devices.len();
        if len == 0 {
            return;
        }

        let current = self
            .selected
            .as_ref()
            .and_then(|s| self.devices.iter().position(|d| d == s));
        let next = match (current, offset < 0) {
            (None, _) => 0,
            (Some(0), true) => len - 1,
            (Some(i), true) => i - 1,
            (Some(i), false) => (i + 1) % len,
        };

        self.selected = Some(self.devices[next].clone());
    }

    fn start_test(&mut self) {
        let Some(device) = self.selected.clone().filter(|d| !d.id.is_empty()) else {
            return;
        };

        self.step = SetupStep::TestingDevice;
        self.status = "Testing camera...".to_string();
        tracing::info!(device = %device.id, "Starting camera test");

        // Failures are logged but the wizard still advances
        if self.open(&device.id, StreamConfig::default()) {
            self.ensure_forwarding(&device.id);
        }
    }

    fn commit(&mut self) {
        let Some(device) = self.selected.clone() else {
            return;
        };

        self.ensure_forwarding(&device.id);

        self.config.camera = CameraConfig::for_device(&device, &StreamConfig::default());
        self.configured = true;
        self.step = SetupStep::Complete;
        self.status = "Camera configured!".to_string();
        self.add_message(format!("Camera configured: {}", device.name), false);
        tracing::info!(device = %device.id, name = %device.name, "Camera committed");

        self.save_config();
    }

    fn resume(&mut self) {
        self.save_config();
        if !self.configured {
            return;
        }

        let device_id = self.config.camera.device_id.clone();
        if self.open_device.as_deref() != Some(device_id.as_str()) {
            let config = self.config.camera.stream_config.stream_config();
            if !self.open(&device_id, config) {
                return;
            }
        }
        self.ensure_forwarding(&device_id);
    }

    fn reset(&mut self) {
        self.close_device();

        self.step = SetupStep::NoDeviceConfigured;
        self.selected = None;
        self.devices.clear();
        self.configured = false;
        self.config.camera = CameraConfig::default();
        self.last_stream_error = None;
        self.status = "!! Camera setup reset !!".to_string();
        tracing::warn!("Camera setup reset");
    }

    /// Open `device_id`, closing whatever device was open before
    fn open(&mut self, device_id: &str, config: StreamConfig) -> bool {
        if self.open_device.is_some() {
            self.close_device();
        }

        match self.source.open(device_id, config) {
            Ok(()) => {
                tracing::info!(device = device_id, resolution = %config.resolution(), fps = config.framerate, "Camera opened");
                self.open_device = Some(device_id.to_string());
                true
            }
            Err(e) => {
                tracing::error!(device = device_id, error = %e, "Failed to open camera");
                self.last_stream_error = Some(e.to_string());
                self.add_message(format!("Failed to open camera: {}", e), true);
                false
            }
        }
    }

    /// Start forwarding for `device_id` unless a task already runs
    ///
    /// Only the open device may be forwarded.
    fn ensure_forwarding(&mut self, device_id: &str) -> bool {
        if self.open_device.as_deref() != Some(device_id) {
            let e = StreamError::NotOpen(device_id.to_string());
            tracing::warn!(device = device_id, error = %e, "Not forwarding");
            self.last_stream_error = Some(e.to_string());
            return false;
        }

        if self.forwarders.is_running(device_id) {
            tracing::debug!(device = device_id, "Already forwarding");
            return true;
        }

        match self.source.frames(device_id) {
            Ok(frames) => {
                self.forwarders
                    .spawn(device_id, frames, Arc::clone(&self.server));
                self.last_stream_error = None;
                true
            }
            Err(e) => {
                tracing::error!(device = device_id, error = %e, "Failed to start stream");
                self.last_stream_error = Some(e.to_string());
                self.add_message(format!("Failed to start stream: {}", e), true);
                false
            }
        }
    }

    /// Stop forwarding and close the open device, if any
    pub fn close_device(&mut self) {
        // Only the open device is ever forwarded
        let cancelled = self.forwarders.cancel_all();
        let Some(device_id) = self.open_device.take() else {
            return;
        };

        tracing::debug!(device = %device_id, cancelled, "Closing camera");
        match self.source.close(&device_id) {
            Ok(()) => tracing::info!(device = %device_id, "Camera closed"),
            Err(e) => tracing::warn!(device = %device_id, error = %e, "Failed to close camera"),
        }
    }

    /// Stop or start the broadcast server and describe the outcome
    pub async fn toggle_server(&mut self) -> &str {
        self.status = if self.server.is_running().await {
            match self.server.shutdown().await {
                Ok(()) => "Server stopped".to_string(),
                Err(e) => format!("Error stopping server: {}", e),
            }
        } else {
            match self.server.start().await {
                Ok(addr) => format!("Server started on port {}", addr.port()),
                Err(e) => {
                    tracing::error!(error = %e, "Error starting server");
                    format!("Error starting server: {}", e)
                }
            }
        };
        &self.status
    }

    /// Save the configuration, stop forwarding and stop the server
    ///
    /// Everything is attempted; the first failure is returned.
    pub async fn quit(&mut self) -> Result<()> {
        let saved = self.store.save(&self.config);
        if let Err(e) = &saved {
            tracing::error!(error = %e, "Failed to save config");
        }

        let cancelled = self.forwarders.cancel_all();
        self.close_device();

        let stopped = match self.server.shutdown().await {
            Err(ServerError::NotRunning) => Ok(()),
            other => other,
        };

        tracing::info!(cancelled_forwarders = cancelled, "Session closed");
        saved?;
        stopped?;
        Ok(())
    }

    fn save_config(&self) {
        if let Err(e) = self.store.save(&self.config) {
            tracing::error!(error = %e, "Failed to save config");
        }
    }

    fn add_message(&mut self, text: String, is_error: bool) {
        if is_error {
            self.status = format!("Error: {}", text);
        }

        if self.messages.len() == MAX_CAMERA_MESSAGES {
            self.messages.pop_front();
        }
        self.messages.push_back(CameraMessage {
            timestamp: Local::now(),
            text,
            is_error,
        });
    }

    /// Current step
    pub fn step(&self) -> SetupStep {
        self.step
    }

    /// Status line
    pub fn status(&self) -> &str {
        &self.status
    }

    /// Whether a camera is committed
    pub fn is_configured(&self) -> bool {
        self.configured
    }

    /// Devices from the last successful scan
    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    /// Tentative selection
    pub fn selected(&self) -> Option<&Device> {
        self.selected.as_ref()
    }

    /// Id of the open device
    pub fn open_device(&self) -> Option<&str> {
        self.open_device.as_deref()
    }

    /// Whether a forwarding task is live
    pub fn is_streaming(&self) -> bool {
        self.forwarders.active() > 0
    }

    /// Why the last stream acquisition failed, if it did
    pub fn last_stream_error(&self) -> Option<&str> {
        self.last_stream_error.as_deref()
    }

    /// Number of running forwarding tasks
    pub fn forwarding_count(&self) -> usize {
        self.forwarders.active()
    }

    /// Most recent operator messages, oldest first
    pub fn camera_messages(&self) -> impl Iterator<Item = &CameraMessage> {
        self.messages.iter()
    }

    /// Configuration that will be persisted
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn server(&self) -> &Arc<BroadcastServer> {
        &self.server
    }
}
