//! Shared CLI error type and helpers.

use crate::config::Config;
use crate::engine::CombinationMode;
use crate::models::{Keymap, LayerId};
use crate::services::KeymapService;
use serde::Serialize;
use std::fmt;
use std::path::Path;

/// Process exit codes used by the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// Command completed
    Success = 0,
    /// Invalid input or failed check
    Validation = 1,
    /// File system or serialization failure
    Io = 2,
}

impl ExitCode {
    /// Numeric process exit code.
    #[must_use]
    pub const fn code(self) -> i32 {
        self as i32
    }
}

/// Category of a CLI failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliErrorKind {
    /// Bad arguments, bad keymap contents, rejected values
    Validation,
    /// Reading or writing files failed
    Io,
}

/// Error returned by command handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliError {
    /// Failure category, decides the exit code
    pub kind: CliErrorKind,
    /// Message printed to stderr
    pub message: String,
}

impl CliError {
    /// Validation failure (exit code 1).
    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            kind: CliErrorKind::Validation,
            message: message.into(),
        }
    }

    /// I/O failure (exit code 2).
    pub fn io(message: impl Into<String>) -> Self {
        Self {
            kind: CliErrorKind::Io,
            message: message.into(),
        }
    }

    /// Exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> ExitCode {
        match self.kind {
            CliErrorKind::Validation => ExitCode::Validation,
            CliErrorKind::Io => ExitCode::Io,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for CliError {}

/// Result type for command handlers.
pub type CliResult<T> = Result<T, CliError>;

/// Loads the configuration, treating a broken config file as a validation error.
pub fn load_config() -> CliResult<Config> {
    Config::load().map_err(|e| CliError::validation(format!("Failed to load configuration: {e:#}")))
}

/// Loads the keymap named by `--keymap` or by `paths.keymap` in the config.
///
/// A missing file is an I/O error; a file that fails to parse or validate is
/// a validation error.
pub fn load_keymap(explicit: Option<&Path>, config: &Config) -> CliResult<Keymap> {
    let path = KeymapService::resolve_path(explicit, config)
        .map_err(|e| CliError::validation(e.to_string()))?;

    if !path.exists() {
        return Err(CliError::io(format!(
            "Keymap file not found: {}",
            path.display()
        )));
    }

    KeymapService::load(&path).map_err(|e| CliError::validation(format!("{e:#}")))
}

/// Picks the combination mode: the explicit flag, otherwise `engine.mode`.
pub fn resolve_mode(explicit: Option<&str>, config: &Config) -> CliResult<CombinationMode> {
    match explicit {
        Some(mode) => mode.parse().map_err(CliError::validation),
        None => Ok(config.engine.mode),
    }
}

/// Resolves a base selector name or layer number to a declared base layer.
pub fn resolve_base(keymap: &Keymap, reference: &str) -> CliResult<LayerId> {
    let layer = keymap
        .base_selector(reference.trim_start_matches('_'))
        .or_else(|| keymap.layer_by_ref(reference))
        .ok_or_else(|| CliError::validation(format!("Unknown layer: {reference}")))?;

    if !keymap.is_base_layer(layer) {
        return Err(CliError::validation(format!(
            "Layer {layer} is not a base layer. Base layers: {}",
            base_names(keymap).join(", ")
        )));
    }

    Ok(layer)
}

/// Declared base selector names with their layers, e.g. `QWERTY (0)`.
#[must_use]
pub fn base_names(keymap: &Keymap) -> Vec<String> {
    keymap
        .metadata
        .base_layers
        .iter()
        .map(|(name, layer)| format!("{name} ({layer})"))
        .collect()
}

/// Prints a value as pretty JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> CliResult<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| CliError::io(format!("Failed to serialize JSON: {e}")))?;
    println!("{json}");
    Ok(())
}
