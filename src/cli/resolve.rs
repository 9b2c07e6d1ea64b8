//! Resolve command: effective action at one position for a given layer set.

use crate::cli::common::{load_config, load_keymap, print_json, resolve_base, CliError, CliResult};
use crate::engine::{LayerStack, MemoryStore};
use crate::models::{Action, Position};
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;

/// Resolve the action at a key position with the given layers active
#[derive(Debug, Clone, Args)]
pub struct ResolveArgs {
    /// Path to keymap markdown file (defaults to paths.keymap from config)
    #[arg(short, long, value_name = "FILE")]
    pub keymap: Option<PathBuf>,

    /// Row of the key position
    #[arg(long)]
    pub row: u8,

    /// Column of the key position
    #[arg(long)]
    pub col: u8,

    /// Active layer: number, name, or _NAME (repeatable)
    #[arg(long = "layer", value_name = "LAYER")]
    pub layers: Vec<String>,

    /// Base layer selector or number (defaults to the keymap default)
    #[arg(long, value_name = "NAME")]
    pub base: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct ResolveResponse {
    row: u8,
    col: u8,
    keycode: String,
    action: Action,
    layer: u8,
    layer_name: String,
    base_layer: u8,
    active_layers: Vec<u8>,
}

impl ResolveArgs {
    /// Execute the resolve command
    pub fn execute(&self) -> CliResult<()> {
        let config = load_config()?;
        let keymap = load_keymap(self.keymap.as_deref(), &config)?;

        let store = match &self.base {
            Some(reference) => MemoryStore::with_base_layer(resolve_base(&keymap, reference)?),
            None => MemoryStore::new(),
        };

        let mut active = Vec::with_capacity(self.layers.len());
        for reference in &self.layers {
            let layer = keymap
                .layer_by_ref(reference)
                .ok_or_else(|| CliError::validation(format!("Unknown layer: {reference}")))?;
            active.push(layer);
        }

        let mut stack = LayerStack::new(keymap, store);
        for layer in active {
            stack.activate(layer);
        }

        let position = Position::new(self.row, self.col);
        let resolved = stack.resolve(position);
        let layer_name = stack
            .keymap()
            .layer(resolved.layer)
            .map(|layer| layer.name.clone())
            .unwrap_or_default();

        let response = ResolveResponse {
            row: self.row,
            col: self.col,
            keycode: resolved.action.to_string(),
            action: resolved.action,
            layer: resolved.layer.get(),
            layer_name,
            base_layer: stack.base_layer().get(),
            active_layers: stack
                .active_layers()
                .iter_descending()
                .map(|layer| layer.get())
                .collect(),
        };

        if self.json {
            return print_json(&response);
        }

        println!(
            "{} -> {} (layer {}: {})",
            position, response.keycode, response.layer, response.layer_name
        );

        Ok(())
    }
}
