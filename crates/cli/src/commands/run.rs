/// Module for the `run` subcommand, which obfuscates the configured input.
///
/// The configuration is loaded (a default one is written when missing), the interpreter is
/// optionally overridden, and the pipeline runs in single-file or transitive mode. A summary
/// is printed and, on request, written as JSON.
use async_trait::async_trait;
use clap::Args;
use pyveil_core::python::PythonHost;
use pyveil_transform::config::ObfuscatorConfig;
use pyveil_transform::obfuscator::{obfuscate, ObfuscationResult};
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Arguments for the `run` subcommand.
#[derive(Args)]
pub struct RunArgs {
    /// Interpreter to use instead of `general.python`.
    #[arg(long)]
    python: Option<String>,
    /// Seed to use instead of `general.seed`.
    #[arg(long)]
    seed: Option<u64>,
    /// Path to write the run summary as JSON.
    #[arg(long)]
    emit: Option<PathBuf>,
}

impl RunArgs {
    fn apply_overrides(&self, config: &mut ObfuscatorConfig) {
        if let Some(python) = &self.python {
            config.general.python.clone_from(python);
        }
        if let Some(seed) = self.seed {
            config.general.seed = seed;
        }
    }
}

#[async_trait]
impl super::Command for RunArgs {
    async fn execute(self, config_path: &Path) -> Result<(), Box<dyn Error>> {
        let mut config = ObfuscatorConfig::load(config_path)?;
        self.apply_overrides(&mut config);
        info!(config = %config_path.display(), python = %config.general.python, "configuration loaded");

        let host = Arc::new(PythonHost::new(config.general.python.clone()));
        let result = obfuscate(&config, host, None).await?;

        if let Some(path) = &self.emit {
            fs::write(path, serde_json::to_string_pretty(&result)?)?;
            println!("Wrote run summary to {}", path.display());
        }
        print_summary(&result);
        Ok(())
    }
}

fn print_summary(result: &ObfuscationResult) {
    if result.nothing_to_do() {
        println!("Nothing to do: every pass is disabled");
        return;
    }
    println!(
        "Applied {} in {} stage(s), seed {}",
        result.metadata.passes.join(", "),
        result.metadata.stages,
        result.metadata.seed_used
    );
    for path in &result.written {
        println!("  wrote {}", path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        args: RunArgs,
    }

    #[test]
    fn overrides_replace_config_values() {
        let wrapper = Wrapper::parse_from(["run", "--python", "python3.12", "--seed", "7"]);
        let mut config = ObfuscatorConfig::default();
        wrapper.args.apply_overrides(&mut config);
        assert_eq!(config.general.python, "python3.12");
        assert_eq!(config.general.seed, 7);

        let wrapper = Wrapper::parse_from(["run"]);
        let mut untouched = ObfuscatorConfig::default();
        wrapper.args.apply_overrides(&mut untouched);
        assert_eq!(untouched, ObfuscatorConfig::default());
    }
}
