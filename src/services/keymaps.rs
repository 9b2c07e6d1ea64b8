//! Keymap file I/O service.
//!
//! This module centralizes keymap file loading and the lookup of the keymap
//! path from command line flags or configuration.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::constants::APP_BINARY_NAME;
use crate::{models::Keymap, parser};

/// Service for keymap file operations.
pub struct KeymapService;

impl KeymapService {
    /// Loads a keymap from a Markdown file.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::path::Path;
    /// use layerstack::services::KeymapService;
    ///
    /// let keymap = KeymapService::load(Path::new("adoah.md"))?;
    /// # Ok::<(), anyhow::Error>(())
    /// ```
    pub fn load(path: &Path) -> Result<Keymap> {
        parser::parse_keymap(path)
            .with_context(|| format!("Failed to load keymap from {}", path.display()))
    }

    /// Picks the keymap path: the explicit flag, otherwise `paths.keymap` from config.
    pub fn resolve_path(explicit: Option<&Path>, config: &Config) -> Result<PathBuf> {
        explicit
            .map(Path::to_path_buf)
            .or_else(|| config.paths.keymap.clone())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "No keymap specified. Pass --keymap FILE or run: {} config set --keymap FILE",
                    APP_BINARY_NAME
                )
            })
    }
}
