//! Configuration System
//!
//! Layered configuration: built-in defaults, then an optional TOML file,
//! then `FOLLOWLOG_*` environment overrides. Validated before use.

use crate::error::EngineError;
use crate::logging::LoggingConfig;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FollowlogConfig {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Snapshot store location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory for the sled database.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

fn default_store_path() -> PathBuf {
    // XDG data dir when resolvable, a local directory otherwise.
    directories::ProjectDirs::from("", "", "followlog")
        .map(|dirs| dirs.data_dir().join("store"))
        .unwrap_or_else(|| PathBuf::from(".followlog/store"))
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            path: default_store_path(),
        }
    }
}

/// External social-graph source endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Base URL of the source API.
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_base_url() -> String {
    "https://localhost:8443".to_string()
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig {
            base_url: default_base_url(),
        }
    }
}

/// Reconciliation scheduling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between reconciliation ticks. Coarse by design; this is not
    /// a real-time change detector.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

fn default_poll_interval_secs() -> u64 {
    3600
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

impl SchedulerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl FollowlogConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.storage.path.as_os_str().is_empty() {
            return Err(EngineError::Config("Store path cannot be empty".into()));
        }
        if self.source.base_url.is_empty() {
            return Err(EngineError::Config("Source base URL cannot be empty".into()));
        }
        if self.scheduler.poll_interval_secs == 0 {
            return Err(EngineError::Config(
                "Poll interval must be at least one second".into(),
            ));
        }
        Ok(())
    }
}

/// Loads configuration from defaults, file, and environment.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Path to the global config file: `~/.config/followlog/config.toml`.
    pub fn global_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "followlog")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load with the standard layering. An explicit `path` must exist; the
    /// global file is optional.
    pub fn load(path: Option<&Path>) -> Result<FollowlogConfig, EngineError> {
        let mut builder = Config::builder();

        match path {
            Some(explicit) => {
                builder = builder.add_source(File::from(explicit.to_path_buf()).required(true));
            }
            None => {
                if let Some(global) = Self::global_config_path() {
                    builder = builder.add_source(File::from(global).required(false));
                }
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("FOLLOWLOG")
                .separator("__")
                .try_parsing(true),
        );

        let config: FollowlogConfig = builder
            .build()
            .map_err(|e| EngineError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| EngineError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }
}
