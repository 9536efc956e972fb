// Configuration for the `todo` binary

use crate::store::DEFAULT_KEY;
use eyre::{Context, Result, eyre};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

const APP_DIR: &str = "todostore";
const CONFIG_FILE: &str = "config.yml";

/// Which storage implementation backs the task slot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    File,
    Sqlite,
}

impl FromStr for Backend {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(Backend::File),
            "sqlite" => Ok(Backend::Sqlite),
            other => Err(eyre!("Unknown backend: {} (expected file or sqlite)", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the slot files or database
    pub data_dir: PathBuf,
    pub backend: Backend,
    /// Storage key of the task slot
    pub key: String,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            backend: Backend::default(),
            key: DEFAULT_KEY.to_string(),
            log_level: "warn".to_string(),
        }
    }
}

impl Config {
    /// Load configuration
    ///
    /// An explicit `path` must exist. Otherwise the per-user config file is
    /// read when present, falling back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::from_file(path);
        }

        match default_config_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => {
                debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config =
            serde_yaml::from_str(&content).with_context(|| format!("Failed to parse config {}", path.display()))?;
        debug!(path = ?path, "Loaded config");
        Ok(config)
    }

    /// Path of the SQLite database used by [`Backend::Sqlite`]
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("todostore.db")
    }
}

/// `<config dir>/todostore/config.yml`, if the platform has a config dir
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR).join(CONFIG_FILE))
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}
