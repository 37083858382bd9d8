//! Persisted configuration.
//!
//! The document is JSON. Every section and key is required and unknown keys
//! are rejected, so a document written by an older layout fails to load
//! instead of silently running with defaults.
use crate::attr_assign::AttrAssign;
use crate::collector::Collector;
use crate::dynamic_code::DynamicCode;
use crate::fstring::FStringToFormat;
use crate::int_encoder::IntEncoder;
use crate::naming::NamingTemplate;
use crate::renamer::Renamer;
use crate::string_encoder::StringEncoder;
use crate::Transform;
use pyveil_core::host::HostRuntime;
use pyveil_core::names::is_identifier;
use pyveil_utils::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

pub const DEFAULT_CONFIG_PATH: &str = "pyveil.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeneralConfig {
    /// File to obfuscate (the entry file in transitive mode).
    pub input: PathBuf,
    /// Output file, or output directory in transitive mode.
    pub output: PathBuf,
    /// Also obfuscate every local file the input imports.
    pub transitive: bool,
    pub seed: u64,
    /// Files processed concurrently in transitive mode.
    pub workers: usize,
    /// Interpreter used for parsing, rendering and compiling.
    pub python: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("input.py"),
            output: PathBuf::from("output.py"),
            transitive: false,
            seed: 42,
            workers: 2,
            python: "python3".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Toggle {
    pub enabled: bool,
}

impl Default for Toggle {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RenamerConfig {
    pub enabled: bool,
    /// Naming template, see [`NamingTemplate`].
    pub rename_format: String,
}

impl Default for RenamerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rename_format: "{kind}{n}".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StringEncoderConfig {
    pub enabled: bool,
    /// Compress literals outside f-strings before encoding.
    pub compress: bool,
}

impl Default for StringEncoderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            compress: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CollectorConfig {
    pub enabled: bool,
    /// Move literals into the table, not only call targets.
    pub collect_consts: bool,
    /// Module-level name the table is bound to.
    pub table_name: String,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            collect_consts: true,
            table_name: "_pyveil_tbl".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DynamicCodeConfig {
    pub enabled: bool,
    /// Encrypt the rebuilt program with a key derived from a decoy function.
    pub encrypt: bool,
}

impl Default for DynamicCodeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            encrypt: false,
        }
    }
}

/// The whole configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ObfuscatorConfig {
    pub general: GeneralConfig,
    pub fstring_to_format: Toggle,
    pub renamer: RenamerConfig,
    pub int_encoder: Toggle,
    pub string_encoder: StringEncoderConfig,
    pub attr_assign: Toggle,
    pub collector: CollectorConfig,
    pub dynamic_code: DynamicCodeConfig,
}

impl ObfuscatorConfig {
    /// Loads `path`. A missing file is replaced by the default document and
    /// reported as [`ConfigError::Missing`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            Self::default().write(path)?;
            info!(path = %path.display(), "wrote default configuration");
            return Err(ConfigError::Missing {
                path: path.display().to_string(),
            });
        }
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn write(&self, path: &Path) -> Result<(), ConfigError> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text + "\n").map_err(|source| ConfigError::Write {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        NamingTemplate::parse(&self.renamer.rename_format)?;
        if !is_identifier(&self.collector.table_name) {
            return Err(ConfigError::Invalid(format!(
                "collector.table_name '{}' is not an identifier",
                self.collector.table_name
            )));
        }
        if self.general.workers == 0 {
            return Err(ConfigError::Invalid("general.workers must be at least 1".into()));
        }
        Ok(())
    }

    /// Builds the enabled passes in their fixed order.
    pub fn build_passes(
        &self,
        host: Arc<dyn HostRuntime>,
    ) -> Result<Vec<Box<dyn Transform>>, ConfigError> {
        let mut passes: Vec<Box<dyn Transform>> = Vec::new();
        if self.fstring_to_format.enabled {
            passes.push(Box::new(FStringToFormat));
        }
        if self.renamer.enabled {
            passes.push(Box::new(Renamer::new(&self.renamer.rename_format)?));
        }
        if self.int_encoder.enabled {
            passes.push(Box::new(IntEncoder));
        }
        if self.string_encoder.enabled {
            passes.push(Box::new(StringEncoder {
                compress: self.string_encoder.compress,
            }));
        }
        if self.attr_assign.enabled {
            passes.push(Box::new(AttrAssign));
        }
        if self.collector.enabled {
            passes.push(Box::new(Collector {
                collect_consts: self.collector.collect_consts,
                table_name: self.collector.table_name.clone(),
            }));
        }
        if self.dynamic_code.enabled {
            passes.push(Box::new(DynamicCode::new(host, self.dynamic_code.encrypt)));
        }
        Ok(passes)
    }
}
