//! ---
//! spc_section: "01-core-functionality"
//! spc_subsection: "module"
//! spc_type: "source"
//! spc_scope: "code"
//! spc_description: "Shared primitives and utilities for the core runtime."
//! spc_version: "v0.0.0-prealpha"
//! spc_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds, DurationSeconds};
use tracing::debug;

use crate::logging::LogFormat;

fn default_controller_name() -> String {
    "space-controller".to_owned()
}

fn default_host_id() -> String {
    "localhost".to_owned()
}

fn default_scan_interval() -> Duration {
    Duration::from_millis(1000)
}

fn default_heartbeat_interval() -> Duration {
    Duration::from_secs(10)
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("target/spc")
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::StructuredJson
}

fn default_in_memory() -> bool {
    true
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(100)
}

/// Primary configuration object for the SPC runtime.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub watcher: WatcherConfig,
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub transport: TransportSettings,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    pub source: PathBuf,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &'static str = "SPC_CONFIG";

    /// Load configuration from disk, respecting the `SPC_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration from disk together with the effective source path.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(&path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(&path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        Err(anyhow!(
            "no configuration files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        contents
            .parse::<AppConfig>()
            .with_context(|| format!("failed to load config file {}", path.display()))
    }

    /// Fill in a controller uuid when none was configured.
    ///
    /// Returns the generated uuid so the caller can report it.
    pub fn ensure_controller_uuid(&mut self) -> Option<String> {
        let missing = self
            .controller
            .uuid
            .as_deref()
            .map_or(true, |uuid| uuid.trim().is_empty());
        if !missing {
            return None;
        }
        let generated = uuid::Uuid::new_v4().to_string();
        self.controller.uuid = Some(generated.clone());
        Some(generated)
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        self.controller.validate()?;
        if self.watcher.scan_interval.is_zero() {
            return Err(anyhow!("watcher scan_interval_ms must be greater than zero"));
        }
        if self.heartbeat.interval.is_zero() {
            return Err(anyhow!("heartbeat interval must be greater than zero"));
        }
        if self.transport.poll_interval.is_zero() {
            return Err(anyhow!("transport poll_interval_ms must be greater than zero"));
        }
        Ok(())
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// Identity of the controller node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default = "default_controller_name")]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_host_id")]
    pub host_id: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            uuid: None,
            name: default_controller_name(),
            description: String::new(),
            host_id: default_host_id(),
        }
    }
}

impl ControllerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.host_id.trim().is_empty() {
            return Err(anyhow!("controller host_id must not be empty"));
        }
        Ok(())
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    #[serde(rename = "scan_interval_ms", default = "default_scan_interval")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub scan_interval: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            scan_interval: default_scan_interval(),
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    #[serde(default = "default_heartbeat_interval")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub interval: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: default_heartbeat_interval(),
        }
    }
}

/// Filesystem layout used by the installer and the data cleaning operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
        }
    }
}

impl StorageConfig {
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding one install directory per live activity.
    pub fn activities_dir(&self) -> PathBuf {
        self.root.join("activities")
    }

    /// Directory holding packed activities between copy and install.
    pub fn staging_dir(&self) -> PathBuf {
        self.root.join("staging")
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root.join("data")
    }

    pub fn tmp_dir(&self) -> PathBuf {
        self.root.join("tmp")
    }

    /// Controller-wide permanent data directory.
    pub fn controller_data_dir(&self) -> PathBuf {
        self.data_dir().join("controller")
    }

    /// Controller-wide temporary data directory.
    pub fn controller_tmp_dir(&self) -> PathBuf {
        self.tmp_dir().join("controller")
    }

    pub fn activity_data_dir(&self, uuid: &str) -> PathBuf {
        self.data_dir().join("activities").join(uuid)
    }

    pub fn activity_tmp_dir(&self, uuid: &str) -> PathBuf {
        self.tmp_dir().join("activities").join(uuid)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: None,
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportSettings {
    #[serde(default = "default_in_memory")]
    pub in_memory_enabled: bool,
    #[serde(rename = "poll_interval_ms", default = "default_poll_interval")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub poll_interval: Duration,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            in_memory_enabled: default_in_memory(),
            poll_interval: default_poll_interval(),
        }
    }
}
