//! Wizard steps and input events

use std::fmt;

/// Camera setup step
///
/// The session is always in exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetupStep {
    /// No camera committed; waiting for a scan
    NoDeviceConfigured,
    /// Discovery in progress
    Scanning,
    /// Operator picks one of the discovered devices
    SelectingDevice,
    /// Selected device is open and (possibly) streaming
    TestingDevice,
    /// Final confirmation before commit
    ConfiguringDevice,
    /// A camera is committed
    Complete,
}

impl SetupStep {
    /// Whether a forwarding task may run in this step
    pub fn is_streaming_capable(&self) -> bool {
        matches!(
            self,
            SetupStep::TestingDevice | SetupStep::ConfiguringDevice | SetupStep::Complete
        )
    }
}

impl fmt::Display for SetupStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SetupStep::NoDeviceConfigured => "no camera configured",
            SetupStep::Scanning => "scanning",
            SetupStep::SelectingDevice => "selecting camera",
            SetupStep::TestingDevice => "testing camera",
            SetupStep::ConfiguringDevice => "configuring camera",
            SetupStep::Complete => "complete",
        };
        f.write_str(name)
    }
}

/// Operator input driving the wizard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionEvent {
    /// Start device discovery
    Scan,
    /// Move the selection up (wraps)
    Up,
    /// Move the selection down (wraps)
    Down,
    /// Accept the current step
    Confirm,
    /// Go back one step
    Back,
    /// Forget the committed camera
    Reset,
}
