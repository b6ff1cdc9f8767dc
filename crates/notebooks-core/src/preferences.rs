//! Persisted initialization state
//!
//! Holds the one-time `hasPreloadData` flag outside the store, so that
//! destroying the store does not re-trigger sample seeding.
//!
//! Storage location: `<data_dir>/preferences.toml`. Writes are atomic
//! (write to temp file, then rename).

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Initialization state handed to [`App`](crate::App) at construction
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Preferences {
    /// Whether the sample data has been seeded
    #[serde(rename = "hasPreloadData", default)]
    has_preload_data: bool,

    /// Backing file, `None` for preferences that are never written
    #[serde(skip)]
    path: Option<PathBuf>,
}

impl Preferences {
    /// Preferences that live only as long as the value
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load preferences from `path`
    ///
    /// Returns defaults if the file doesn't exist. Later calls to
    /// [`save`](Self::save) write back to the same path.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let mut prefs = if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read preferences: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse preferences: {:?}", path))?
        } else {
            Self::default()
        };

        prefs.path = Some(path);
        Ok(prefs)
    }

    pub fn has_preload_data(&self) -> bool {
        self.has_preload_data
    }

    pub fn set_has_preload_data(&mut self, value: bool) {
        self.has_preload_data = value;
    }

    /// Backing file, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Write preferences to their backing file
    ///
    /// A no-op for in-memory preferences.
    pub fn save(&self) -> Result<()> {
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };

        let content = toml::to_string_pretty(self).context("Failed to serialize preferences")?;
        atomic_write(path, content.as_bytes())
            .with_context(|| format!("Failed to save preferences to {:?}", path))
    }
}

/// Replace `path` with `data` through a synced sibling `.tmp` file
fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {:?}", parent))?;
    }

    let temp_path = path.with_extension("tmp");

    let mut file = File::create(&temp_path)
        .with_context(|| format!("Failed to create temp file {:?}", temp_path))?;
    file.write_all(data)
        .with_context(|| format!("Failed to write to temp file {:?}", temp_path))?;
    file.sync_all()
        .with_context(|| format!("Failed to sync temp file {:?}", temp_path))?;

    fs::rename(&temp_path, path)
        .with_context(|| format!("Failed to rename {:?} to {:?}", temp_path, path))?;

    Ok(())
}
