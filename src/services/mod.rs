//! Service layer for keymap loading and keycode interpretation.
//!
//! This module contains services that coordinate between the parser, the
//! models and the command line.

pub mod keycodes;
pub mod keymaps;

// Re-export commonly used types and functions
pub use keymaps::KeymapService;
