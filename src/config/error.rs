//! Configuration persistence errors

use std::path::PathBuf;

/// Error type for loading or saving the persisted record
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Reading, writing or creating the config location failed
    #[error("config I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The file is not a valid record
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    /// The platform has no per-user config directory
    #[error("unable to determine user config directory")]
    NoConfigDir,
}
