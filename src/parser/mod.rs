//! Parsing for keymap files.
//!
//! This module reads keymaps from Markdown files with YAML frontmatter.

pub mod keymap;

// Re-export commonly used functions
pub use keymap::{parse_keymap, parse_keymap_str};
