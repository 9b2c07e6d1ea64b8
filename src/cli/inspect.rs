//! Inspect command: summary of a keymap's layers and layer roles.

use crate::cli::common::{base_names, load_config, load_keymap, print_json, CliResult};
use crate::models::{Keymap, Layer};
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;

/// Show the layers, base layers and tri-layer assignment of a keymap
#[derive(Debug, Clone, Args)]
pub struct InspectArgs {
    /// Path to keymap markdown file (defaults to paths.keymap from config)
    #[arg(short, long, value_name = "FILE")]
    pub keymap: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct InspectResponse {
    name: String,
    description: String,
    default_base: u8,
    base_layers: Vec<BaseLayerInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tri_layer: Option<TriLayerInfo>,
    layers: Vec<LayerInfo>,
}

#[derive(Debug, Serialize)]
struct BaseLayerInfo {
    selector: String,
    layer: u8,
}

#[derive(Debug, Serialize)]
struct TriLayerInfo {
    lower: u8,
    raise: u8,
    adjust: u8,
}

#[derive(Debug, Serialize)]
struct LayerInfo {
    id: u8,
    name: String,
    role: &'static str,
    keys: usize,
    transparent: usize,
}

impl InspectArgs {
    /// Execute the inspect command
    pub fn execute(&self) -> CliResult<()> {
        let config = load_config()?;
        let keymap = load_keymap(self.keymap.as_deref(), &config)?;
        let response = build_response(&keymap);

        if self.json {
            return print_json(&response);
        }

        println!("Keymap: {}", response.name);
        if !response.description.is_empty() {
            println!("  {}", response.description);
        }
        println!();
        println!("Base layers: {}", base_names(&keymap).join(", "));
        println!("Default base: {}", response.default_base);
        match &response.tri_layer {
            Some(tri) => println!(
                "Tri-layer: lower={} raise={} adjust={}",
                tri.lower, tri.raise, tri.adjust
            ),
            None => println!("Tri-layer: none"),
        }
        println!();
        println!("Layers:");
        for layer in &response.layers {
            println!(
                "  {:>2}  {:<16} {:<8} {} keys, {} transparent",
                layer.id, layer.name, layer.role, layer.keys, layer.transparent
            );
        }

        Ok(())
    }
}

fn build_response(keymap: &Keymap) -> InspectResponse {
    let tri = keymap.metadata.tri_layer;

    InspectResponse {
        name: keymap.metadata.name.clone(),
        description: keymap.metadata.description.clone(),
        default_base: keymap.default_base().get(),
        base_layers: keymap
            .metadata
            .base_layers
            .iter()
            .map(|(selector, layer)| BaseLayerInfo {
                selector: selector.clone(),
                layer: layer.get(),
            })
            .collect(),
        tri_layer: tri.map(|tri| TriLayerInfo {
            lower: tri.lower.get(),
            raise: tri.raise.get(),
            adjust: tri.adjust.get(),
        }),
        layers: keymap
            .layers
            .iter()
            .map(|layer| LayerInfo {
                id: layer.id.get(),
                name: layer.name.clone(),
                role: layer_role(keymap, layer),
                keys: layer.keys.len(),
                transparent: layer
                    .keys
                    .iter()
                    .filter(|key| key.entry.is_transparent())
                    .count(),
            })
            .collect(),
    }
}

fn layer_role(keymap: &Keymap, layer: &Layer) -> &'static str {
    if keymap.is_base_layer(layer.id) {
        return "base";
    }
    match keymap.metadata.tri_layer {
        Some(tri) if tri.lower == layer.id => "lower",
        Some(tri) if tri.raise == layer.id => "raise",
        Some(tri) if tri.adjust == layer.id => "adjust",
        _ => "overlay",
    }
}
