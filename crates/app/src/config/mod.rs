use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{AppError, Result};

const APP_DIR_NAME: &str = "usage-tracker";
const CONFIG_FILE_NAME: &str = "config.toml";
const DB_FILE_NAME: &str = "usage-tracker.sqlite";
pub const DEFAULT_RETENTION_DAYS: u32 = 395;
pub const DEFAULT_REFRESH_TIMEOUT_SECS: u64 = 120;

/// Settings read from `config.toml`. Missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub db_path: PathBuf,
    /// Empty means the client's default project directories.
    pub log_roots: Vec<PathBuf>,
    pub retention_days: u32,
    pub refresh_timeout_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pricing_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: data_dir().join(DB_FILE_NAME),
            log_roots: Vec::new(),
            retention_days: DEFAULT_RETENTION_DAYS,
            refresh_timeout_secs: DEFAULT_REFRESH_TIMEOUT_SECS,
            pricing_path: None,
        }
    }
}

impl AppConfig {
    pub fn log_roots(&self) -> Vec<PathBuf> {
        if self.log_roots.is_empty() {
            ingest::default_log_roots()
        } else {
            self.log_roots.clone()
        }
    }

    /// Oldest instant still worth reading or keeping.
    pub fn retention_horizon(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - ChronoDuration::days(i64::from(self.retention_days))
    }

    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_secs(self.refresh_timeout_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.retention_days == 0 {
            return Err(AppError::Config("retention_days must be at least 1".to_string()));
        }
        if self.refresh_timeout_secs == 0 {
            return Err(AppError::Config(
                "refresh_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ConfigLoad {
    pub config: AppConfig,
    pub path: PathBuf,
    pub created: bool,
}

fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

pub fn default_config_path() -> PathBuf {
    config_dir().join(CONFIG_FILE_NAME)
}

/// Reads the config at `path`, writing a default one first when it is missing.
pub fn load_or_create(path: &Path) -> Result<ConfigLoad> {
    if path.exists() {
        let contents = fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        config.validate()?;
        return Ok(ConfigLoad {
            config,
            path: path.to_path_buf(),
            created: false,
        });
    }

    let config = AppConfig::default();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let contents = toml::to_string_pretty(&config)
        .map_err(|err| AppError::Config(format!("serialize config: {}", err)))?;
    fs::write(path, contents)?;
    info!(path = %path.display(), "created default config");
    Ok(ConfigLoad {
        config,
        path: path.to_path_buf(),
        created: true,
    })
}
