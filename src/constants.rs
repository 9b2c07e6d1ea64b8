//! Application-wide constants.
//!
//! This module defines constants used throughout the application,
//! including the binary name and on-disk locations.

/// The binary name of the application (used in command examples).
pub const APP_BINARY_NAME: &str = "layerstack";

/// Directory name under the platform config directory.
pub const APP_DATA_DIR: &str = "LayerStack";

/// Environment variable that overrides the config directory (used by tests).
pub const CONFIG_DIR_ENV: &str = "LAYERSTACK_CONFIG_DIR";

/// Number of addressable layers (width of the layer state word).
pub const MAX_LAYERS: u8 = 32;

/// Supported keymap schema version.
pub const KEYMAP_SCHEMA_VERSION: &str = "1.0";
