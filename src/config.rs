//! Configuration management for the application.
//!
//! This module handles loading, validating, and saving application configuration
//! in TOML format with platform-specific directory resolution.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::{APP_DATA_DIR, CONFIG_DIR_ENV};
use crate::engine::CombinationMode;

/// Path configuration for file system locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PathConfig {
    /// Default keymap file used when `--keymap` is not given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keymap: Option<PathBuf>,
    /// Base layer state file (defaults to `<config dir>/state.toml`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_file: Option<PathBuf>,
}

/// Layer engine settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    /// How Lower and Raise combine into Adjust
    #[serde(default)]
    pub mode: CombinationMode,
}

/// Application configuration.
///
/// # File Location
///
/// - Linux: `~/.config/LayerStack/config.toml`
/// - macOS: `~/Library/Application Support/LayerStack/config.toml`
/// - Windows: `%APPDATA%\LayerStack\config.toml`
///
/// The directory can be overridden with the `LAYERSTACK_CONFIG_DIR`
/// environment variable.
///
/// # Validation
///
/// - `keymap` path must exist (if set)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Config {
    /// File system paths
    #[serde(default)]
    pub paths: PathConfig,
    /// Engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl Config {
    /// Creates a new Config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks if the config file exists on disk.
    #[must_use]
    pub fn exists() -> bool {
        Self::config_file_path()
            .map(|path| path.exists())
            .unwrap_or(false)
    }

    /// Gets the config directory path.
    ///
    /// `LAYERSTACK_CONFIG_DIR` wins when set, otherwise:
    /// - Linux: `~/.config/LayerStack/`
    /// - macOS: `~/Library/Application Support/LayerStack/`
    /// - Windows: `%APPDATA%\LayerStack\`
    pub fn config_dir() -> Result<PathBuf> {
        if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV) {
            if !dir.is_empty() {
                return Ok(PathBuf::from(dir));
            }
        }

        let config_dir = dirs::config_dir()
            .context("Failed to determine config directory")?
            .join(APP_DATA_DIR);

        Ok(config_dir)
    }

    /// Gets the full path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Loads configuration from the config file.
    ///
    /// If the file doesn't exist, returns default configuration.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    /// Loads configuration from an explicit file path.
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::new());
        }

        let content = fs::read_to_string(config_path).context(format!(
            "Failed to read config file: {}",
            config_path.display()
        ))?;

        let config: Self = toml::from_str(&content).context(format!(
            "Failed to parse config file: {}",
            config_path.display()
        ))?;

        Ok(config)
    }

    /// Saves configuration to the config file using atomic write.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path()?)
    }

    /// Saves configuration to an explicit file path.
    ///
    /// Uses temp file + rename pattern for atomic writes.
    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        self.validate()?;

        // Ensure config directory exists
        if let Some(config_dir) = config_path.parent() {
            fs::create_dir_all(config_dir).context(format!(
                "Failed to create config directory: {}",
                config_dir.display()
            ))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;
        let temp_path = config_path.with_extension("toml.tmp");

        fs::write(&temp_path, content).context(format!(
            "Failed to write temp config file: {}",
            temp_path.display()
        ))?;

        // Atomic rename
        fs::rename(&temp_path, config_path).context(format!(
            "Failed to rename temp config file to: {}",
            config_path.display()
        ))?;

        Ok(())
    }

    /// Validates configuration values.
    ///
    /// Checks:
    /// - keymap path exists (if set) and is a file
    pub fn validate(&self) -> Result<()> {
        if let Some(keymap) = &self.paths.keymap {
            if !keymap.exists() {
                anyhow::bail!("Keymap file does not exist: {}", keymap.display());
            }
            if !keymap.is_file() {
                anyhow::bail!("Keymap path is not a file: {}", keymap.display());
            }
        }

        Ok(())
    }

    /// State file for the persisted base layer.
    ///
    /// `paths.state_file` if set, otherwise `state.toml` in the config directory.
    pub fn state_file_path(&self) -> Result<PathBuf> {
        match &self.paths.state_file {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::config_dir()?.join("state.toml")),
        }
    }
}
