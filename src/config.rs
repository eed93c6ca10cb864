use enumset::EnumSet;
use serde::{Deserialize, Serialize};
use std::{
    fs::{read_to_string, write},
    path::{Path, PathBuf},
};

use crate::{codec::BlockType, error::NetsnapError};

pub const DEFAULT_CONFIG_FILE: &str = "netsnap.toml";

/// Tunables for parsing and batch ingestion. Every field has a default, so a partial TOML file
/// (or none at all) is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetsnapConfig {
    /// Handler failures in a row before a file is abandoned
    pub max_consecutive_errors: usize,
    /// Device tasks allowed to run at once
    pub max_concurrent_devices: usize,
    /// Preferred capture file names inside a device folder, in order
    pub capture_file_names: Vec<String>,
    /// Extensions considered text-like when no preferred name exists
    pub capture_extensions: Vec<String>,
    pub enabled_parsers: EnumSet<BlockType>,
    /// SQLite file; the in-memory store is used when absent
    pub database: Option<PathBuf>,
}

impl Default for NetsnapConfig {
    fn default() -> Self {
        NetsnapConfig {
            max_consecutive_errors: 50,
            max_concurrent_devices: 8,
            capture_file_names: ["capture.txt", "show.txt", "output.txt", "display.txt", "log.txt"]
                .into_iter()
                .map(String::from)
                .collect(),
            capture_extensions: ["txt", "log", "cap", "out"]
                .into_iter()
                .map(String::from)
                .collect(),
            enabled_parsers: BlockType::all(),
            database: None,
        }
    }
}

impl NetsnapConfig {
    pub fn validate(&self) -> Result<(), NetsnapError> {
        if self.max_consecutive_errors == 0 {
            return Err(NetsnapError::Config(
                "max_consecutive_errors must be at least 1".to_string(),
            ));
        }
        if self.max_concurrent_devices == 0 {
            return Err(NetsnapError::Config(
                "max_concurrent_devices must be at least 1".to_string(),
            ));
        }
        if self.enabled_parsers.is_empty() {
            return Err(NetsnapError::Config("no parsers are enabled".to_string()));
        }
        Ok(())
    }
}

pub trait ConfigProvider: Send + Sync {
    fn load(&self) -> Result<NetsnapConfig, NetsnapError>;
    fn save(&self, config: &NetsnapConfig) -> Result<(), NetsnapError>;
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TomlConfigProvider {
    path: PathBuf,
}

impl TomlConfigProvider {
    pub fn new(path: PathBuf) -> Self {
        TomlConfigProvider { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigProvider for TomlConfigProvider {
    fn load(&self) -> Result<NetsnapConfig, NetsnapError> {
        tracing::debug!("Attempting to read config from: {:?}", &self.path);
        if !self.path.exists() {
            tracing::debug!("Config file not found, using defaults.");
            return Ok(NetsnapConfig::default());
        }
        let content = read_to_string(&self.path)?;
        let config: NetsnapConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    fn save(&self, config: &NetsnapConfig) -> Result<(), NetsnapError> {
        tracing::debug!("Attempting to write config to: {:?}", &self.path);
        config.validate()?;
        let toml_string = toml::to_string(config)?;
        write(&self.path, toml_string)?;
        Ok(())
    }
}
