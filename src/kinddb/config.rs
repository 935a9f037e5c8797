use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{KindError, Result};
use crate::ids::{HashedIds, IdGenerator, UuidIds};

pub const CONFIG_FILENAME: &str = "kinddb.json";
const DEFAULT_DATA_FILE: &str = "kinddb-data.json";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Memory,
    #[default]
    File,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum IdStrategy {
    /// UUID v4 string ids.
    #[default]
    Uuid,
    /// Positive integer ids.
    Hashed,
}

impl IdStrategy {
    pub fn generator(self) -> Box<dyn IdGenerator> {
        match self {
            IdStrategy::Uuid => Box::new(UuidIds),
            IdStrategy::Hashed => Box::new(HashedIds),
        }
    }
}

/// Datastore configuration, stored as `kinddb.json` in a config directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: BackendKind,

    /// Data file for the file backend. Relative paths resolve against the config directory.
    #[serde(default = "default_path")]
    pub path: PathBuf,

    #[serde(default)]
    pub ids: IdStrategy,
}

fn default_path() -> PathBuf {
    PathBuf::from(DEFAULT_DATA_FILE)
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            path: default_path(),
            ids: IdStrategy::default(),
        }
    }
}

impl StoreConfig {
    /// Load config from the given directory, or return defaults if not found
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join(CONFIG_FILENAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path).map_err(KindError::Io)?;
        let config: StoreConfig =
            serde_json::from_str(&content).map_err(KindError::Serialization)?;
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, config_dir: P) -> Result<()> {
        let config_dir = config_dir.as_ref();

        if !config_dir.exists() {
            fs::create_dir_all(config_dir).map_err(KindError::Io)?;
        }

        let config_path = config_dir.join(CONFIG_FILENAME);
        let content = serde_json::to_string_pretty(self).map_err(KindError::Serialization)?;
        fs::write(config_path, content).map_err(KindError::Io)?;
        Ok(())
    }

    pub fn data_path(&self, base_dir: &Path) -> PathBuf {
        if self.path.is_absolute() {
            self.path.clone()
        } else {
            base_dir.join(&self.path)
        }
    }
}
