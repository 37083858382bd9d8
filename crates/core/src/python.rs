//! [`SourceCodec`] and [`HostRuntime`] backed by a real interpreter.
//!
//! Every call starts `python -c <bridge>`, writes one JSON request to its
//! stdin and reads one JSON reply from its stdout. Trees cross the boundary
//! in the shape defined by [`crate::ast`].
use crate::ast::Module;
use crate::code::CompiledUnit;
use crate::host::{HostRuntime, HostVersion, SourceCodec};
use pyveil_utils::errors::HostError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::process::{Command, Stdio};
use std::sync::OnceLock;
use tracing::{debug, trace};

const BRIDGE: &str = include_str!("bridge.py");

#[derive(Serialize)]
#[serde(tag = "op", rename_all = "lowercase")]
enum Request<'a> {
    Version,
    Parse { source: &'a str, path: &'a str },
    Unparse { module: &'a Module },
    Compile { module: &'a Module, filename: &'a str },
}

#[derive(Deserialize)]
struct Reply<T> {
    ok: bool,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    error: Option<String>,
    result: Option<T>,
}

/// A host runtime reached through an interpreter subprocess.
#[derive(Debug)]
pub struct PythonHost {
    program: String,
    version: OnceLock<HostVersion>,
}

impl Default for PythonHost {
    fn default() -> Self {
        Self::new("python3")
    }
}

impl PythonHost {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            version: OnceLock::new(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Whether the interpreter can be started at all.
    pub fn is_available(&self) -> bool {
        self.version().is_ok()
    }

    fn call<T: DeserializeOwned>(&self, request: &Request<'_>, path: &str) -> Result<T, HostError> {
        let payload = serde_json::to_vec(request)?;
        trace!(program = %self.program, bytes = payload.len(), "bridge request");

        let mut child = Command::new(&self.program)
            .arg("-c")
            .arg(BRIDGE)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| HostError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&payload)?;
        }
        let output = child.wait_with_output()?;
        if output.stdout.is_empty() {
            return Err(HostError::Protocol(format!(
                "no reply (status {}): {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let mut de = serde_json::Deserializer::from_slice(&output.stdout);
        de.disable_recursion_limit();
        let reply = Reply::<T>::deserialize(&mut de)?;
        if reply.ok {
            return reply
                .result
                .ok_or_else(|| HostError::Protocol("reply without result".into()));
        }

        let message = reply.error.unwrap_or_default();
        debug!(kind = ?reply.kind, %message, "bridge reported failure");
        Err(match reply.kind.as_deref() {
            Some("syntax") => HostError::Syntax {
                path: path.to_owned(),
                message,
            },
            Some("render") => HostError::Render(message),
            Some("compile") => HostError::Compile(message),
            _ => HostError::Runtime(message),
        })
    }
}

impl SourceCodec for PythonHost {
    fn parse(&self, source: &str, path: &str) -> Result<Module, HostError> {
        self.call(&Request::Parse { source, path }, path)
    }

    fn unparse(&self, module: &Module) -> Result<String, HostError> {
        self.call(&Request::Unparse { module }, "<tree>")
    }
}

impl HostRuntime for PythonHost {
    fn version(&self) -> Result<HostVersion, HostError> {
        if let Some(v) = self.version.get() {
            return Ok(*v);
        }
        let v: HostVersion = self.call(&Request::Version, "<version>")?;
        Ok(*self.version.get_or_init(|| v))
    }

    fn compile(&self, module: &Module, filename: &str) -> Result<CompiledUnit, HostError> {
        self.call(&Request::Compile { module, filename }, filename)
    }
}
