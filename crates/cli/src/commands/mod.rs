use async_trait::async_trait;
use clap::Subcommand;
use std::error::Error;
use std::path::Path;

pub mod deps;
pub mod init;
pub mod run;

#[derive(Subcommand)]
pub enum Cmd {
    /// Obfuscate the configured input
    Run(run::RunArgs),

    /// Write the default configuration
    Init(init::InitArgs),

    /// Print the local import tree of a program
    Deps(deps::DepsArgs),
}

#[async_trait]
pub trait Command {
    async fn execute(self, config: &Path) -> Result<(), Box<dyn Error>>;
}

#[async_trait]
impl Command for Cmd {
    async fn execute(self, config: &Path) -> Result<(), Box<dyn Error>> {
        match self {
            Cmd::Run(args) => args.execute(config).await,
            Cmd::Init(args) => args.execute(config).await,
            Cmd::Deps(args) => args.execute(config).await,
        }
    }
}
