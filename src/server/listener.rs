//! Broadcast server listener
//!
//! Binds the HTTP endpoint, spawns the accept loop and owns its lifecycle.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use bytes::Bytes;
use tokio::net::TcpListener;
use tokio::sync::{watch, Mutex, Semaphore};
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

use super::config::ServerConfig;
use super::connection::{self, ServerState};
use super::error::ServerError;
use super::pages;
use crate::registry::FrameRegistry;

/// Handle to a bound, running endpoint
struct RunningServer {
    local_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Frame broadcast server
///
/// One listening endpoint with an upgrade route. Upgraded connections join
/// the [`FrameRegistry`]; [`broadcast`](Self::broadcast) fans a frame out to
/// all of them.
pub struct BroadcastServer {
    config: parking_lot::Mutex<ServerConfig>,
    registry: Arc<FrameRegistry>,
    running: Mutex<Option<RunningServer>>,
}

impl BroadcastServer {
    /// Create a new server with the given configuration
    pub fn new(config: ServerConfig) -> Self {
        let registry = Arc::new(FrameRegistry::with_config(config.registry_config()));
        Self::with_registry(config, registry)
    }

    /// Create a new server that fans out through an existing registry
    pub fn with_registry(config: ServerConfig, registry: Arc<FrameRegistry>) -> Self {
        Self {
            config: parking_lot::Mutex::new(config),
            registry,
            running: Mutex::new(None),
        }
    }

    /// Get a reference to the frame registry
    pub fn registry(&self) -> &Arc<FrameRegistry> {
        &self.registry
    }

    /// Bind the endpoint and spawn the accept loop
    ///
    /// Returns as soon as the socket is bound; connections are served by a
    /// background task. Bind failures are returned here.
    pub async fn start(&self) -> Result<SocketAddr, ServerError> {
        let mut running = self.running.lock().await;
        if running.as_ref().is_some_and(|r| !r.task.is_finished()) {
            tracing::warn!("Server start requested, but server is already running");
            return Err(ServerError::AlreadyRunning);
        }

        let config = self.config.lock().clone();
        let listener = TcpListener::bind(config.bind_addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: config.bind_addr,
                source,
            })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ServerError::Bind {
                addr: config.bind_addr,
                source,
            })?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let state = ServerState {
            registry: Arc::clone(&self.registry),
            shutdown: shutdown_rx.clone(),
            ws_path: Arc::from(config.ws_path.as_str()),
            connection_limit: (config.max_connections > 0)
                .then(|| Arc::new(Semaphore::new(config.max_connections))),
        };
        let app = router(&config.ws_path, state);

        let mut signal = shutdown_rx;
        let task = tokio::spawn(async move {
            tracing::info!(addr = %local_addr, "Broadcast server listening");

            let result = axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async move { connection::wait_shutdown(&mut signal).await })
            .await;

            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server error");
            }
            tracing::debug!(addr = %local_addr, "Accept loop exited");
        });

        *running = Some(RunningServer {
            local_addr,
            shutdown: shutdown_tx,
            task,
        });

        tracing::info!(port = local_addr.port(), "Server is running on port {}", local_addr.port());
        Ok(local_addr)
    }

    /// Shut the endpoint down
    ///
    /// In-flight requests get `timeout` to finish before the accept loop is
    /// aborted. Every subscriber is closed, so later broadcasts reach nobody.
    pub async fn stop(&self, timeout: Duration) -> Result<(), ServerError> {
        let mut running = self.running.lock().await;
        let Some(server) = running.take() else {
            tracing::warn!("Server stop requested, but server is not running");
            return Err(ServerError::NotRunning);
        };

        tracing::info!(addr = %server.local_addr, "Stopping server...");
        let _ = server.shutdown.send(true);

        let mut task = server.task;
        if tokio::time::timeout(timeout, &mut task).await.is_err() {
            tracing::warn!(timeout = ?timeout, "Graceful shutdown timed out, forcing close");
            task.abort();
        }

        let closed = self.registry.close_all().await;
        tracing::info!(closed_subscribers = closed, "Server stopped successfully!");
        Ok(())
    }

    /// Stop with the configured grace period
    pub async fn shutdown(&self) -> Result<(), ServerError> {
        let timeout = self.config.lock().shutdown_timeout;
        self.stop(timeout).await
    }

    /// Fan a frame out to every live subscriber
    ///
    /// Returns the number of subscribers that received it.
    pub async fn broadcast(&self, frame: Bytes) -> usize {
        self.registry.broadcast(frame).await
    }

    /// Check whether the endpoint is bound and serving
    pub async fn is_running(&self) -> bool {
        self.running
            .lock()
            .await
            .as_ref()
            .is_some_and(|r| !r.task.is_finished())
    }

    /// Address actually bound, if running
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.running.lock().await.as_ref().map(|r| r.local_addr)
    }

    /// Configured port
    pub fn port(&self) -> u16 {
        self.config.lock().bind_addr.port()
    }

    /// Change the port used by the next `start`
    pub async fn set_port(&self, port: u16) -> Result<(), ServerError> {
        if self.is_running().await {
            return Err(ServerError::PortLocked);
        }
        self.config.lock().bind_addr.set_port(port);
        Ok(())
    }

    /// Get a copy of the server configuration
    pub fn config(&self) -> ServerConfig {
        self.config.lock().clone()
    }
}

fn router(ws_path: &str, state: ServerState) -> Router {
    Router::new()
        .route("/", get(pages::index))
        .route("/setup-preview", get(pages::setup_preview))
        .route("/live-monitor", get(pages::live_monitor))
        .route(ws_path, get(connection::ws_camera))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
