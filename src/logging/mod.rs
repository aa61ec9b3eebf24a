//! Display logging
//!
//! Components log through `tracing`. [`FunnelLayer`] copies each event into
//! a [`LogFunnel`], which buffers them and releases them to the display in
//! throttled batches. The regular `fmt` layer still writes to stderr.

pub mod funnel;
pub mod layer;
pub mod level;

pub use funnel::{FunnelConfig, LogEntry, LogFunnel};
pub use layer::FunnelLayer;
pub use level::{LogLevel, Verbosity};

use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Layer};

/// Install the global subscriber
///
/// stderr output follows `RUST_LOG` (warnings by default). The funnel sees
/// this crate's events down to debug and only warnings from dependencies;
/// its own verbosity setting does the rest.
pub fn init(funnel: &LogFunnel) -> Result<(), TryInitError> {
    let stderr_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let funnel_filter = Targets::new()
        .with_target(env!("CARGO_CRATE_NAME"), LevelFilter::DEBUG)
        .with_target("tower_http", LevelFilter::DEBUG)
        .with_default(LevelFilter::WARN);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(stderr_filter),
        )
        .with(FunnelLayer::new(funnel.clone()).with_filter(funnel_filter))
        .try_init()
}
