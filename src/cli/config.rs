//! Configuration management CLI commands.

use crate::cli::common::{load_config, print_json, CliError, CliResult};
use crate::config::Config;
use crate::engine::CombinationMode;
use clap::{Args, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

/// Configuration management commands
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Display current configuration
    Show(ConfigShowArgs),
    /// Set configuration values
    Set(ConfigSetArgs),
}

/// Display current configuration
#[derive(Args, Debug)]
pub struct ConfigShowArgs {
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

/// Set configuration values
#[derive(Args, Debug)]
pub struct ConfigSetArgs {
    /// Default keymap file
    #[arg(short, long, value_name = "FILE")]
    keymap: Option<PathBuf>,

    /// Combination mode (simple, exclusive, or tracked)
    #[arg(long, value_name = "MODE")]
    mode: Option<String>,

    /// Base layer state file
    #[arg(long, value_name = "FILE")]
    state_file: Option<PathBuf>,
}

/// JSON-serializable configuration for output
#[derive(Serialize, Debug)]
struct ConfigOutput {
    config_file: String,
    paths: PathsOutput,
    engine: EngineOutput,
}

#[derive(Serialize, Debug)]
struct PathsOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    keymap: Option<String>,
    state_file: String,
}

#[derive(Serialize, Debug)]
struct EngineOutput {
    mode: CombinationMode,
}

impl ConfigArgs {
    /// Execute config subcommand
    pub fn execute(&self) -> CliResult<()> {
        match &self.command {
            ConfigCommand::Show(args) => args.execute(),
            ConfigCommand::Set(args) => args.execute(),
        }
    }
}

impl ConfigShowArgs {
    /// Execute show command
    pub fn execute(&self) -> CliResult<()> {
        let config = load_config()?;
        let output = build_output(&config)?;

        if self.json {
            print_json(&output)?;
        } else {
            println!("Config file: {}", output.config_file);
            println!();
            println!("[paths]");
            println!(
                "  keymap:     {}",
                output.paths.keymap.as_deref().unwrap_or("(not set)")
            );
            println!("  state_file: {}", output.paths.state_file);
            println!();
            println!("[engine]");
            println!("  mode:       {}", output.engine.mode);
        }

        Ok(())
    }
}

impl ConfigSetArgs {
    /// Execute set command
    pub fn execute(&self) -> CliResult<()> {
        // At least one argument must be provided
        if self.keymap.is_none() && self.mode.is_none() && self.state_file.is_none() {
            return Err(CliError::validation(
                "At least one configuration option must be specified: --keymap, --mode, or --state-file",
            ));
        }

        let mut config = load_config()?;

        if let Some(path) = &self.keymap {
            if !path.is_file() {
                return Err(CliError::validation(format!(
                    "Keymap file does not exist: {}",
                    path.display()
                )));
            }
            config.paths.keymap = Some(path.clone());
        }

        if let Some(mode) = &self.mode {
            config.engine.mode = mode.parse().map_err(CliError::validation)?;
        }

        if let Some(path) = &self.state_file {
            config.paths.state_file = Some(path.clone());
        }

        config
            .save()
            .map_err(|e| CliError::io(format!("Failed to save configuration: {e:#}")))?;

        println!("Configuration updated successfully.");

        Ok(())
    }
}

fn build_output(config: &Config) -> CliResult<ConfigOutput> {
    let config_file = Config::config_file_path()
        .map_err(|e| CliError::io(format!("Failed to locate config file: {e}")))?;
    let state_file = config
        .state_file_path()
        .map_err(|e| CliError::io(format!("Failed to locate state file: {e}")))?;

    Ok(ConfigOutput {
        config_file: config_file.display().to_string(),
        paths: PathsOutput {
            keymap: config
                .paths
                .keymap
                .as_ref()
                .map(|p| p.to_string_lossy().to_string()),
            state_file: state_file.display().to_string(),
        },
        engine: EngineOutput {
            mode: config.engine.mode,
        },
    })
}
