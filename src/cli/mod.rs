//! CLI command handlers for LayerStack.
//!
//! Headless, scriptable access to the layer engine: inspect keymaps, resolve
//! positions, replay event scripts and manage the persisted base layer.

pub mod base;
pub mod common;
pub mod config;
pub mod inspect;
pub mod resolve;
pub mod simulate;

// Re-export types used by main.rs and tests
pub use base::BaseArgs;
pub use common::{CliError, CliResult, ExitCode};
pub use config::ConfigArgs;
pub use inspect::InspectArgs;
pub use resolve::ResolveArgs;
pub use simulate::SimulateArgs;
