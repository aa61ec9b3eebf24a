//! Server configuration

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::registry::RegistryConfig;

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 8080;

/// Default upgrade route for the camera stream
pub const DEFAULT_WS_PATH: &str = "/ws/camera";

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Route that upgrades to the frame stream
    pub ws_path: String,

    /// Maximum concurrent subscribers (0 = unlimited)
    pub max_connections: usize,

    /// Deadline for one frame write to one subscriber
    pub write_timeout: Duration,

    /// Grace period for in-flight requests on stop
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            ws_path: DEFAULT_WS_PATH.to_string(),
            max_connections: 0, // Unlimited
            write_timeout: Duration::from_millis(500),
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the port, keeping the bind IP
    pub fn port(mut self, port: u16) -> Self {
        self.bind_addr.set_port(port);
        self
    }

    /// Set the upgrade route
    pub fn ws_path(mut self, path: impl Into<String>) -> Self {
        self.ws_path = path.into();
        self
    }

    /// Set maximum subscribers
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the per-write deadline
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Set the shutdown grace period
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Registry configuration derived from this config
    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig::default().write_timeout(self.write_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();

        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.ws_path, "/ws/camera");
        assert_eq!(config.max_connections, 0);
        assert_eq!(config.write_timeout, Duration::from_millis(500));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_with_addr() {
        let addr: SocketAddr = "127.0.0.1:8081".parse().unwrap();
        let config = ServerConfig::with_addr(addr);

        assert_eq!(config.bind_addr.port(), 8081);
    }

    #[test]
    fn test_builder_port_keeps_ip() {
        let addr: SocketAddr = "127.0.0.1:8080".parse().unwrap();
        let config = ServerConfig::with_addr(addr).port(9000);

        assert_eq!(config.bind_addr, "127.0.0.1:9000".parse().unwrap());
    }

    #[test]
    fn test_registry_config_follows_write_timeout() {
        let config = ServerConfig::default().write_timeout(Duration::from_millis(40));

        assert_eq!(
            config.registry_config().write_timeout,
            Duration::from_millis(40)
        );
    }

    #[test]
    fn test_builder_chaining() {
        let addr: SocketAddr = "127.0.0.1:8080".parse().unwrap();
        let config = ServerConfig::default()
            .bind(addr)
            .ws_path("/ws/preview")
            .max_connections(8)
            .write_timeout(Duration::from_millis(250))
            .shutdown_timeout(Duration::from_secs(1));

        assert_eq!(config.bind_addr, addr);
        assert_eq!(config.ws_path, "/ws/preview");
        assert_eq!(config.max_connections, 8);
        assert_eq!(config.write_timeout, Duration::from_millis(250));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(1));
    }
}
