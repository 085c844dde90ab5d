use std::path::{Path, PathBuf};

use anchor_log::LogConfig;
use anchor_store::{SyncMode, WalConfig, DEFAULT_SHARDS};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// File holding the framed anchor records under `data_dir`.
pub const RECORDS_FILE: &str = "records.wal";
/// File holding the framed anchor events under `data_dir`.
pub const EVENTS_FILE: &str = "events.wal";

/// Configuration of an anchor registry.
///
/// ```toml
/// data_dir = "/var/lib/anchors"
/// node_id = 1
/// shards = 16
/// sync_mode = "every_write"
/// channel_capacity = 1024
/// ```
///
/// Every field is optional. Without `data_dir` the registry lives in memory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistryConfig {
    /// Directory for `records.wal` and `events.wal`.
    pub data_dir: Option<PathBuf>,
    /// Node identifier stamped into every timestamp.
    pub node_id: u16,
    /// Number of lock shards in the record index.
    pub shards: usize,
    pub sync_mode: SyncMode,
    /// Live-event buffer per subscriber before it must catch up from the log.
    pub channel_capacity: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            node_id: 0,
            shards: DEFAULT_SHARDS,
            sync_mode: SyncMode::default(),
            channel_capacity: 1024,
        }
    }
}

impl RegistryConfig {
    /// An in-memory registry with default settings.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// A durable registry rooted at `data_dir`, syncing every write.
    pub fn durable(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: Some(data_dir.into()),
            sync_mode: SyncMode::EveryWrite,
            ..Self::default()
        }
    }

    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.shards == 0 {
            return Err(ConfigError::Invalid("shards must be at least 1".into()));
        }
        if self.channel_capacity == 0 {
            return Err(ConfigError::Invalid(
                "channel_capacity must be at least 1".into(),
            ));
        }
        if let Some(dir) = &self.data_dir {
            if dir.as_os_str().is_empty() {
                return Err(ConfigError::Invalid("data_dir must not be empty".into()));
            }
        }
        Ok(())
    }

    pub fn records_path(&self) -> Option<PathBuf> {
        self.data_dir.as_ref().map(|dir| dir.join(RECORDS_FILE))
    }

    pub fn events_path(&self) -> Option<PathBuf> {
        self.data_dir.as_ref().map(|dir| dir.join(EVENTS_FILE))
    }

    pub fn wal_config(&self) -> WalConfig {
        WalConfig {
            sync_mode: self.sync_mode,
        }
    }

    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            channel_capacity: self.channel_capacity,
            wal: self.wal_config(),
        }
    }
}
