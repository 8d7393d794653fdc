//! Link service configuration with TOML file support.
//!
//! Keys keep the PascalCase names of the link config surface:
//!
//! ```toml
//! MaxAttempts = 3
//! StreamTimeoutSecs = 10
//!
//! [Pinning]
//! PerSeconds = 30
//!
//! [Hash]
//! BackupSeconds = 30
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::logging::LogFormat;
use crate::NodeError;

/// File the config lives in, relative to the repo root.
pub const CONFIG_FILE: &str = "linker.toml";

/// Default LMDB directory, relative to the repo root.
const DEFAULT_DATA_DIR: &str = ".data";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LinkConfig {
    /// Failed interactions a peer may accumulate before it is evicted on
    /// the next one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Deadline for serving or fetching one protocol stream.
    #[serde(default = "default_stream_timeout_secs")]
    pub stream_timeout_secs: u64,

    #[serde(default = "default_map_size_mb")]
    pub map_size_mb: usize,

    /// LMDB directory. Relative paths resolve against the repo root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub pinning: PinningConfig,

    /// Pin snapshot backup.
    #[serde(default)]
    pub hash: BackupConfig,

    /// Peer directory backup.
    #[serde(default)]
    pub address: BackupConfig,

    #[serde(default)]
    pub discovery: DiscoveryConfig,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PinningConfig {
    /// Pin set refresh interval.
    #[serde(default = "default_interval_secs")]
    pub per_seconds: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BackupConfig {
    #[serde(default = "default_interval_secs")]
    pub backup_seconds: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DiscoveryConfig {
    /// Interval for syncing connected transport peers into the directory.
    #[serde(default = "default_interval_secs")]
    pub per_seconds: u64,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_max_attempts() -> u32 {
    3
}

fn default_interval_secs() -> u64 {
    30
}

fn default_stream_timeout_secs() -> u64 {
    10
}

fn default_map_size_mb() -> usize {
    64
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for PinningConfig {
    fn default() -> Self {
        Self {
            per_seconds: default_interval_secs(),
        }
    }
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            backup_seconds: default_interval_secs(),
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            per_seconds: default_interval_secs(),
        }
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            stream_timeout_secs: default_stream_timeout_secs(),
            map_size_mb: default_map_size_mb(),
            data_dir: None,
            log_format: default_log_format(),
            log_level: default_log_level(),
            pinning: PinningConfig::default(),
            hash: BackupConfig::default(),
            address: BackupConfig::default(),
            discovery: DiscoveryConfig::default(),
        }
    }
}

// ── Impl ───────────────────────────────────────────────────────────────

fn secs(value: u64) -> Duration {
    Duration::from_secs(value.max(1))
}

impl LinkConfig {
    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))
    }

    pub fn to_toml_string(&self) -> Result<String, NodeError> {
        toml::to_string_pretty(self).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Read `<repo>/linker.toml`, falling back to defaults when the file is
    /// missing, unreadable, or undecodable.
    pub fn load_or_default(repo: &Path) -> Self {
        let path = repo.join(CONFIG_FILE);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "no link config, using defaults");
                return Self::default();
            }
        };
        match Self::from_toml_str(&content) {
            Ok(config) => config,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "undecodable link config, using defaults");
                Self::default()
            }
        }
    }

    /// Write the config to `<repo>/linker.toml`.
    pub fn store(&self, repo: &Path) -> Result<(), NodeError> {
        let content = self.to_toml_string()?;
        std::fs::create_dir_all(repo).map_err(|e| NodeError::Config(e.to_string()))?;
        std::fs::write(repo.join(CONFIG_FILE), content)
            .map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Load the effective config and write it back, so the file on disk
    /// lists every key with its current value.
    pub fn init(repo: &Path) -> Result<Self, NodeError> {
        let config = Self::load_or_default(repo);
        config.store(repo)?;
        Ok(config)
    }

    /// Install the global subscriber using `log_format` and `log_level`.
    pub fn init_logging(&self) -> Result<(), NodeError> {
        crate::logging::init_logging(LogFormat::parse(&self.log_format), &self.log_level)
    }

    pub fn data_dir(&self, repo: &Path) -> PathBuf {
        match &self.data_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => repo.join(dir),
            None => repo.join(DEFAULT_DATA_DIR),
        }
    }

    pub fn map_size_bytes(&self) -> usize {
        self.map_size_mb.max(1).saturating_mul(1024 * 1024)
    }

    pub fn stream_timeout(&self) -> Duration {
        secs(self.stream_timeout_secs)
    }

    pub fn pin_refresh_interval(&self) -> Duration {
        secs(self.pinning.per_seconds)
    }

    pub fn pin_backup_interval(&self) -> Duration {
        secs(self.hash.backup_seconds)
    }

    pub fn peer_backup_interval(&self) -> Duration {
        secs(self.address.backup_seconds)
    }

    pub fn discovery_interval(&self) -> Duration {
        secs(self.discovery.per_seconds)
    }
}
