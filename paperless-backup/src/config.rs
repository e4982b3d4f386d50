//! Configuration management for the backup tool.
//!
//! Built-in defaults, overridden by an optional TOML file, overridden by
//! `PAPERLESS_BACKUP__<SECTION>__<KEY>` environment variables.

use crate::utils::errors::{BackupError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const ENV_PREFIX: &str = "PAPERLESS_BACKUP";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backup: BackupConfig,
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub volumes: VolumesConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Directory holding archives, the lock file and the log file
    #[serde(default = "default_backup_dir")]
    pub dir: PathBuf,

    /// Log file name, relative to `dir`
    #[serde(default = "default_log_file")]
    pub log_file: String,

    /// Lock file name, relative to `dir`
    #[serde(default = "default_lock_file")]
    pub lock_file: String,

    /// Archives older than this many days are pruned
    #[serde(default = "default_max_age_days")]
    pub max_age_days: u32,

    /// Free space required in `dir` before archiving
    #[serde(default = "default_required_space_mb")]
    pub required_space_mb: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// systemd unit quiesced during the backup
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Seconds to wait after stopping the unit so containers release files
    #[serde(default = "default_settle_secs")]
    pub settle_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumesConfig {
    /// Docker volumes archived, in order
    #[serde(default = "default_volume_names")]
    pub names: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default values
fn default_backup_dir() -> PathBuf {
    PathBuf::from("/var/local/paperless-ngx/backups")
}

fn default_log_file() -> String {
    "backup.log".to_string()
}

fn default_lock_file() -> String {
    "backup.lock".to_string()
}

fn default_max_age_days() -> u32 {
    3
}

fn default_required_space_mb() -> u64 {
    10_000
}

fn default_service_name() -> String {
    "paperless-ngx.service".to_string()
}

fn default_settle_secs() -> u64 {
    2
}

fn default_volume_names() -> Vec<String> {
    vec![
        "paperless-ngx_data".to_string(),
        "paperless-ngx_media".to_string(),
        "paperless-ngx_redisdata".to_string(),
    ]
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            dir: default_backup_dir(),
            log_file: default_log_file(),
            lock_file: default_lock_file(),
            max_age_days: default_max_age_days(),
            required_space_mb: default_required_space_mb(),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            settle_secs: default_settle_secs(),
        }
    }
}

impl Default for VolumesConfig {
    fn default() -> Self {
        Self {
            names: default_volume_names(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from defaults, an optional TOML file and the process environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, None)
    }

    /// Like [`Config::load`], reading environment overrides from `env` instead
    /// of the process environment when given.
    pub fn load_with_env(
        path: Option<&Path>,
        env: Option<config::Map<String, String>>,
    ) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(true),
            );
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("volumes.names")
                .try_parsing(true)
                .source(env),
        );

        let config: Config = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.volumes.names.is_empty() {
            return Err(BackupError::Config("no volumes configured".into()));
        }
        if self.volumes.names.iter().any(|n| n.trim().is_empty()) {
            return Err(BackupError::Config("volume names must not be empty".into()));
        }
        if self.service.name.trim().is_empty() {
            return Err(BackupError::Config("service name must not be empty".into()));
        }
        if self.backup.lock_file.is_empty() || self.backup.log_file.is_empty() {
            return Err(BackupError::Config(
                "lock_file and log_file must not be empty".into(),
            ));
        }
        Ok(())
    }

    pub fn lock_path(&self) -> PathBuf {
        self.backup.dir.join(&self.backup.lock_file)
    }

    pub fn log_path(&self) -> PathBuf {
        self.backup.dir.join(&self.backup.log_file)
    }

    /// Render the effective configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| BackupError::Config(e.to_string()))
    }
}
