/// Module for the `init` subcommand, which writes the default configuration.
use async_trait::async_trait;
use clap::Args;
use pyveil_transform::config::ObfuscatorConfig;
use std::error::Error;
use std::path::Path;

/// Arguments for the `init` subcommand.
#[derive(Args)]
pub struct InitArgs {
    /// Overwrite an existing configuration.
    #[arg(long)]
    force: bool,
}

#[async_trait]
impl super::Command for InitArgs {
    async fn execute(self, config_path: &Path) -> Result<(), Box<dyn Error>> {
        if config_path.exists() && !self.force {
            return Err(format!(
                "{} already exists, pass --force to overwrite it",
                config_path.display()
            )
            .into());
        }
        ObfuscatorConfig::default().write(config_path)?;
        println!("Wrote default configuration to {}", config_path.display());
        Ok(())
    }
}
