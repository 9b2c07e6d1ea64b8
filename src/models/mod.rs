//! Data models for keymaps, layers and key entries.
//!
//! Models are independent of the engine and of the CLI.

pub mod keymap;
pub mod layer;

// Re-export all model types
pub use keymap::{Keymap, KeymapMetadata, TriLayer};
pub use layer::{Action, KeyDefinition, KeyEntry, Layer, LayerId, LayerSet, Position};
