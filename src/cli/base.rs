//! Base layer commands: read or write the persisted base layer selection.

use crate::cli::common::{
    base_names, load_config, load_keymap, print_json, resolve_base, CliError, CliResult,
};
use crate::config::Config;
use crate::engine::{BaseLayerStore, FileStore};
use crate::models::{Keymap, LayerId};
use clap::{Args, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

/// Persisted base layer commands
#[derive(Args, Debug)]
pub struct BaseArgs {
    #[command(subcommand)]
    command: BaseCommand,
}

#[derive(Subcommand, Debug)]
enum BaseCommand {
    /// Show the persisted base layer
    Show(BaseShowArgs),
    /// Select and persist a base layer
    Set(BaseSetArgs),
}

/// Show the persisted base layer
#[derive(Args, Debug)]
pub struct BaseShowArgs {
    /// Path to keymap markdown file (defaults to paths.keymap from config)
    #[arg(short, long, value_name = "FILE")]
    keymap: Option<PathBuf>,

    /// Base layer state file (defaults to paths.state_file or the config directory)
    #[arg(long, value_name = "FILE")]
    state_file: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

/// Select and persist a base layer
#[derive(Args, Debug)]
pub struct BaseSetArgs {
    /// Base layer selector (e.g. QWERTY) or layer number
    #[arg(value_name = "NAME")]
    name: String,

    /// Path to keymap markdown file (defaults to paths.keymap from config)
    #[arg(short, long, value_name = "FILE")]
    keymap: Option<PathBuf>,

    /// Base layer state file (defaults to paths.state_file or the config directory)
    #[arg(long, value_name = "FILE")]
    state_file: Option<PathBuf>,
}

#[derive(Serialize, Debug)]
struct BaseOutput {
    layer: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    selector: Option<String>,
    persisted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    saved_at: Option<String>,
    state_file: String,
}

impl BaseArgs {
    /// Execute base subcommand
    pub fn execute(&self) -> CliResult<()> {
        match &self.command {
            BaseCommand::Show(args) => args.execute(),
            BaseCommand::Set(args) => args.execute(),
        }
    }
}

fn open_store(explicit: Option<&PathBuf>, config: &Config) -> CliResult<FileStore> {
    let path = match explicit {
        Some(path) => path.clone(),
        None => config
            .state_file_path()
            .map_err(|e| CliError::io(format!("Failed to locate state file: {e}")))?,
    };
    Ok(FileStore::new(path))
}

impl BaseShowArgs {
    /// Execute show command
    pub fn execute(&self) -> CliResult<()> {
        let config = load_config()?;
        let keymap = load_keymap(self.keymap.as_deref(), &config)?;
        let mut store = open_store(self.state_file.as_ref(), &config)?;

        let persisted = store
            .load_base_layer()
            .map_err(|e| CliError::io(format!("{e:#}")))?;
        let saved_at = store
            .saved_at()
            .map_err(|e| CliError::io(format!("{e:#}")))?;

        // Same fallback the layer stack applies at startup
        let (layer, persisted) = match persisted {
            Some(layer) if keymap.is_base_layer(layer) => (layer, true),
            _ => (keymap.default_base(), false),
        };

        let output = BaseOutput {
            layer: layer.get(),
            selector: keymap.base_name(layer).map(str::to_string),
            persisted,
            saved_at: saved_at
                .filter(|_| persisted)
                .map(|time| time.to_rfc3339()),
            state_file: store.path().display().to_string(),
        };

        if self.json {
            return print_json(&output);
        }

        println!("Base layer: {}", describe(&keymap, layer));
        if persisted {
            if let Some(saved_at) = &output.saved_at {
                println!("Saved at: {saved_at}");
            }
        } else {
            println!("Nothing persisted, using keymap default");
        }
        println!("Available: {}", base_names(&keymap).join(", "));

        Ok(())
    }
}

impl BaseSetArgs {
    /// Execute set command
    pub fn execute(&self) -> CliResult<()> {
        let config = load_config()?;
        let keymap = load_keymap(self.keymap.as_deref(), &config)?;
        let layer = resolve_base(&keymap, &self.name)?;

        let mut store = open_store(self.state_file.as_ref(), &config)?;
        store
            .save_base_layer(layer)
            .map_err(|e| CliError::io(format!("Failed to persist base layer: {e:#}")))?;

        println!("Base layer set to {}", describe(&keymap, layer));
        Ok(())
    }
}

fn describe(keymap: &Keymap, layer: LayerId) -> String {
    match keymap.base_name(layer) {
        Some(name) => format!("{name} ({layer})"),
        None => layer.to_string(),
    }
}
