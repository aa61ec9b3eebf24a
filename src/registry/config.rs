//! Registry configuration

use std::time::Duration;

/// Configuration for the frame registry
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Deadline for one frame write to one connection
    pub write_timeout: Duration,

    /// Deadline for closing a removed connection
    pub close_timeout: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            write_timeout: Duration::from_millis(500),
            close_timeout: Duration::from_millis(250),
        }
    }
}

impl RegistryConfig {
    /// Set the per-write deadline
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Set the close deadline
    pub fn close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }
}
