/// Entry point for the pyveil CLI, a Python source obfuscator.
///
/// This module parses command-line arguments, initializes logging and dispatches to the
/// subcommands for running the configured pipeline, writing a default configuration, or
/// printing a program's local dependency tree.
use clap::Parser;
use pyveil_cli::commands::{Cmd, Command};
use pyveil_transform::config::DEFAULT_CONFIG_PATH;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Command-line interface for pyveil.
///
/// pyveil rewrites Python programs through a configurable pipeline of passes (f-string
/// lowering, renaming, literal encoding, call indirection and code-object reconstruction)
/// while keeping their behavior.
#[derive(Parser)]
#[command(name = "pyveil")]
#[command(about = "pyveil: Python source obfuscator")]
struct Cli {
    #[command(subcommand)]
    command: Cmd,

    /// Configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
}

/// Runs the pyveil CLI with the provided arguments.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    cli.command.execute(&cli.config).await
}
