//! Application configuration
//!
//! Values come from three layers, later ones winning:
//! 1. Built-in defaults
//! 2. `config.toml` in the platform config directory (or `NOTEBOOKS_CONFIG`)
//! 3. `NOTEBOOKS_*` environment variables

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};

const ENV_PREFIX: &str = "NOTEBOOKS";

/// Default store identifier
pub const DEFAULT_STORE_NAME: &str = "Notebooks";

/// Default bound for the longer side of a note thumbnail, in pixels
pub const DEFAULT_THUMBNAIL_MAX_DIMENSION: u32 = 120;

/// Where the store lives and how new notes are processed
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the SQLite store and the preferences file
    pub data_dir: PathBuf,

    /// Store identifier; the database file is `<store_name>.sqlite`
    pub store_name: String,

    /// Longest side of thumbnails generated for new notes
    pub thumbnail_max_dimension: u32,

    /// Seed the sample notebook on first launch
    pub preload_sample_data: bool,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("notebooks");

        Self {
            data_dir,
            store_name: DEFAULT_STORE_NAME.to_string(),
            thumbnail_max_dimension: DEFAULT_THUMBNAIL_MAX_DIMENSION,
            preload_sample_data: true,
        }
    }
}

impl Config {
    /// Load from the default config file, then apply the environment
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load from `path`, then apply the environment
    ///
    /// A missing file means defaults. The data directory is created.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content)
                .with_context(|| format!("Invalid config file {:?}", path))?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Self::default(),
            Err(e) => {
                return Err(e).with_context(|| format!("Cannot read config file {:?}", path))
            }
        };

        config.apply_env_overrides()?;
        config.validate()?;
        config.ensure_data_dir()?;
        Ok(config)
    }

    /// Load from `--config` when given, otherwise from the default location
    pub fn load_with_cli_override(config_path: Option<&Path>) -> Result<Self> {
        config_path.map_or_else(Self::load, Self::load_from_path)
    }

    /// Parse TOML and apply the environment, without touching the disk
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(toml_content).context("Invalid config TOML")?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Configuration rooted at `data_dir` with every other value defaulted
    ///
    /// Ignores files and environment; meant for tests and embedding.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(dir) = env_value("DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(name) = env_value("STORE_NAME").filter(|name| !name.is_empty()) {
            self.store_name = name;
        }
        if let Some(max) = env_value("THUMBNAIL_MAX_DIMENSION") {
            self.thumbnail_max_dimension = max.parse().with_context(|| {
                format!("{}_THUMBNAIL_MAX_DIMENSION must be a number, got {:?}", ENV_PREFIX, max)
            })?;
        }
        Ok(())
    }

    /// Reject values that would only fail later, when a note is added
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.thumbnail_max_dimension > 0,
            "thumbnail_max_dimension must be at least 1"
        );
        ensure!(!self.store_name.is_empty(), "store_name cannot be empty");
        Ok(())
    }

    /// Create the data directory if it is missing
    pub fn ensure_data_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)
            .with_context(|| format!("Cannot create data directory {:?}", self.data_dir))
    }

    /// Write to the default config file
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_file_path())
    }

    /// Write to `config_path`, creating its directory
    pub fn save_to_path(&self, config_path: &Path) -> Result<()> {
        if let Some(dir) = config_path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Cannot create config directory {:?}", dir))?;
        }

        let content = toml::to_string_pretty(self).context("Cannot serialize config")?;
        std::fs::write(config_path, content)
            .with_context(|| format!("Cannot write config file {:?}", config_path))
    }

    /// `NOTEBOOKS_CONFIG`, or `notebooks/config.toml` in the platform config
    /// directory
    pub fn config_file_path() -> PathBuf {
        match env_value("CONFIG") {
            Some(path) => PathBuf::from(path),
            None => dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("notebooks")
                .join("config.toml"),
        }
    }

    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join(format!("{}.sqlite", self.store_name))
    }

    pub fn preferences_path(&self) -> PathBuf {
        self.data_dir.join("preferences.toml")
    }
}

fn env_value(suffix: &str) -> Option<String> {
    std::env::var(format!("{}_{}", ENV_PREFIX, suffix)).ok()
}
