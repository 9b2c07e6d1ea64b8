//! LayerStack - layer composition engine for QMK-style keymaps
//!
//! Command-line front end for inspecting keymaps, resolving key positions,
//! replaying key event scripts through the tri-layer controller and managing
//! the persisted base layer.

use clap::{Parser, Subcommand};
use layerstack::cli::{BaseArgs, CliError, ConfigArgs, InspectArgs, ResolveArgs, SimulateArgs};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// LayerStack - layer composition engine for QMK-style keymaps
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the layers, base layers and tri-layer assignment of a keymap
    Inspect(InspectArgs),
    /// Resolve the action at a key position with the given layers active
    Resolve(ResolveArgs),
    /// Replay key events through the layer controller
    Simulate(SimulateArgs),
    /// Show or set the persisted base layer
    Base(BaseArgs),
    /// Show or change configuration
    Config(ConfigArgs),
}

impl Command {
    fn execute(&self) -> Result<(), CliError> {
        match self {
            Self::Inspect(args) => args.execute(),
            Self::Resolve(args) => args.execute(),
            Self::Simulate(args) => args.execute(),
            Self::Base(args) => args.execute(),
            Self::Config(args) => args.execute(),
        }
    }
}

fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays machine-readable
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = cli.command.execute() {
        eprintln!("Error: {e}");
        std::process::exit(e.exit_code().code());
    }
}
