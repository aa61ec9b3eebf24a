//! Configuration storage backends

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use super::error::ConfigError;
use super::AppConfig;

/// Directory under the user config dir that holds our files
pub const APP_DIR: &str = "perchcam";

/// File name of the persisted record
pub const CONFIG_FILE: &str = "config.json";

/// Where the persisted record lives
///
/// The session only reads and writes [`AppConfig`] through this trait and
/// never sees the storage mechanism.
pub trait ConfigStore: Send + Sync {
    /// Load the record, or defaults if none has been saved yet
    fn load(&self) -> Result<AppConfig, ConfigError>;

    /// Persist the record
    fn save(&self, config: &AppConfig) -> Result<(), ConfigError>;
}

/// Pretty-printed JSON file
#[derive(Debug, Clone)]
pub struct JsonConfigStore {
    path: PathBuf,
}

impl JsonConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<user config dir>/perchcam/config.json`
    pub fn default_location() -> Result<Self, ConfigError> {
        let dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(Self::new(dir.join(APP_DIR).join(CONFIG_FILE)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> ConfigError {
        ConfigError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl ConfigStore for JsonConfigStore {
    fn load(&self) -> Result<AppConfig, ConfigError> {
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "No config file, using defaults");
                return Ok(AppConfig::default());
            }
            Err(e) => return Err(self.io_error(e)),
        };

        serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&self, config: &AppConfig) -> Result<(), ConfigError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).map_err(|e| self.io_error(e))?;
        }

        let data = serde_json::to_string_pretty(config).map_err(|source| ConfigError::Parse {
            path: self.path.clone(),
            source,
        })?;
        fs::write(&self.path, data).map_err(|e| self.io_error(e))?;

        tracing::info!(path = %self.path.display(), "Config saved");
        Ok(())
    }
}

/// In-process store
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    config: Mutex<AppConfig>,
    saves: AtomicUsize,
}

impl MemoryConfigStore {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config: Mutex::new(config),
            saves: AtomicUsize::new(0),
        }
    }

    /// Last saved record
    pub fn current(&self) -> AppConfig {
        self.config.lock().clone()
    }

    /// Number of successful saves
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::Relaxed)
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load(&self) -> Result<AppConfig, ConfigError> {
        Ok(self.current())
    }

    fn save(&self, config: &AppConfig) -> Result<(), ConfigError> {
        *self.config.lock() = config.clone();
        self.saves.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
