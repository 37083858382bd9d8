//! Seams to the host runtime: source codec and compiler.
use crate::ast::Module;
use crate::code::CompiledUnit;
use pyveil_utils::errors::HostError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Version triple of the host interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HostVersion {
    pub major: u32,
    pub minor: u32,
    pub micro: u32,
}

impl HostVersion {
    pub const fn new(major: u32, minor: u32, micro: u32) -> Self {
        Self {
            major,
            minor,
            micro,
        }
    }

    pub const fn at_least(&self, major: u32, minor: u32) -> bool {
        self.major > major || (self.major == major && self.minor >= minor)
    }
}

impl fmt::Display for HostVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.micro)
    }
}

/// Turns source text into trees and back.
pub trait SourceCodec: Send + Sync {
    /// Parses `source`; `path` is only used in diagnostics.
    fn parse(&self, source: &str, path: &str) -> Result<Module, HostError>;

    /// Renders a tree back to source text. Fails rather than emitting text
    /// that would not re-parse to the same tree.
    fn unparse(&self, module: &Module) -> Result<String, HostError>;
}

/// Compiles trees into the runtime's native compiled units.
pub trait HostRuntime: Send + Sync {
    fn version(&self) -> Result<HostVersion, HostError>;

    /// Compiles `module` at the highest optimization level.
    fn compile(&self, module: &Module, filename: &str) -> Result<CompiledUnit, HostError>;
}
