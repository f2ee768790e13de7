/// User configuration, read from an optional `config.toml`.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::db;
use crate::store::StoreSettings;

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub db_path: Option<PathBuf>,
    pub log_cap: Option<usize>,
    pub session_cap: Option<usize>,
    pub min_session_seconds: Option<u64>,
}

impl Config {
    /// Loads `<config dir>/tally/config.toml`, or defaults when it doesn't exist.
    pub fn load() -> Result<Self> {
        match default_config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config at {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("Invalid config at {}", path.display()))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        if config.log_cap == Some(0) {
            anyhow::bail!("log_cap must be at least 1");
        }
        Ok(config)
    }

    pub fn db_path(&self) -> PathBuf {
        self.db_path.clone().unwrap_or_else(db::default_db_path)
    }

    pub fn store_settings(&self) -> StoreSettings {
        let defaults = StoreSettings::default();
        StoreSettings {
            log_cap: self.log_cap.unwrap_or(defaults.log_cap),
            session_cap: self.session_cap.or(defaults.session_cap),
            min_session_seconds: self
                .min_session_seconds
                .unwrap_or(defaults.min_session_seconds),
            ..defaults
        }
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("tally").join("config.toml"))
}
