//! Locus CLI - Command-line interface
//!
//! Drives the locus request arbiter against a simulated location sensor and
//! manages the user configuration file.

mod commands;
mod error;

use clap::{Parser, Subcommand};
use locus::config::ConfigFile;
use locus::logging::init_logging;

use commands::config::ConfigCommands;
use commands::simulate::SimulateArgs;
use error::CliError;

#[derive(Parser)]
#[command(name = "locus")]
#[command(version = locus::VERSION)]
#[command(about = "Share one location sensor between many requests", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a request against a simulated sensor and report what happened
    Simulate(SimulateArgs),

    /// View or modify configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        e.exit();
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Simulate(args) => {
            let config = ConfigFile::load()?;
            let _guard = init_logging(&config.logging.directory, &config.logging.file)
                .map_err(|e| CliError::LoggingInit(e.to_string()))?;
            tracing::info!(version = locus::VERSION, "locus simulate starting");
            commands::simulate::run(args, &config)
        }
        Commands::Config { action } => commands::config::run(action),
    }
}
