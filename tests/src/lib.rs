//! Shared fixtures for the cross-crate tests.
//!
//! Everything here needs a real interpreter. [`python`] probes for one and
//! callers return early when it is missing.
use pyveil_core::python::PythonHost;
use pyveil_transform::config::ObfuscatorConfig;
use pyveil_transform::obfuscator::{obfuscate, ObfuscationResult};
use pyveil_utils::errors::ObfuscateError;
use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Pass names in pipeline order.
pub const PASSES: [&str; 7] = [
    "fstring_to_format",
    "renamer",
    "int_encoder",
    "string_encoder",
    "attr_assign",
    "collector",
    "dynamic_code",
];

pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// The default interpreter, if it can be started.
pub fn python() -> Option<Arc<PythonHost>> {
    init_logging();
    let host = PythonHost::default();
    if host.is_available() {
        Some(Arc::new(host))
    } else {
        tracing::warn!("python3 is not available, skipping");
        None
    }
}

/// Default configuration with every pass but `pass` disabled.
pub fn only(pass: &str) -> ObfuscatorConfig {
    let mut config = ObfuscatorConfig::default();
    config.fstring_to_format.enabled = pass == "fstring_to_format";
    config.renamer.enabled = pass == "renamer";
    config.int_encoder.enabled = pass == "int_encoder";
    config.string_encoder.enabled = pass == "string_encoder";
    config.attr_assign.enabled = pass == "attr_assign";
    config.collector.enabled = pass == "collector";
    config.dynamic_code.enabled = pass == "dynamic_code";
    config
}

/// Writes `source` to `dir/input.py` and obfuscates it to `dir/output.py`.
pub async fn obfuscate_source(
    host: Arc<PythonHost>,
    dir: &Path,
    source: &str,
    mut config: ObfuscatorConfig,
) -> Result<ObfuscationResult, ObfuscateError> {
    fs::write(dir.join("input.py"), source)?;
    config.general.input = dir.join("input.py");
    config.general.output = dir.join("output.py");
    config.general.transitive = false;
    obfuscate(&config, host, None).await
}

/// Runs `file` with `python3` from `dir`.
pub fn execute(dir: &Path, file: &Path) -> Output {
    Command::new("python3")
        .arg(file)
        .current_dir(dir)
        .output()
        .expect("python3 disappeared")
}

/// Whether the interpreter can import `module`.
pub fn has_module(module: &str) -> bool {
    Command::new("python3")
        .args(["-c", &format!("import {module}")])
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// A program touching every construct the passes rewrite.
pub const SAMPLE: &str = r#"import math


class Account:
    rate = 3

    def __init__(self, owner, balance=0):
        self.owner = owner
        self.balance = balance

    def deposit(self, amount):
        self.balance += amount * self.rate
        return self

    def __repr__(self):
        return f"Account({self.owner!r}, {self.balance:>8})"


def summarize(accounts, *, label="total"):
    total = sum(a.balance for a in accounts)
    squares = [n * n for n in range(5)]
    return f"{label}: {total} {squares} {math.floor(2.5)}"


def counter():
    count = 0

    def bump():
        nonlocal count
        count += 1
        return count

    return bump


accounts = [Account("ann").deposit(10), Account("bob", 5)]
print(accounts)
print(summarize(accounts, label="sum"))
bump = counter()
bump()
print(bump(), -300000000000, 0, b"\x00\xff", "café".upper(), "x".join("abc"))
"#;
