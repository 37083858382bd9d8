/// Module for the `deps` subcommand, which prints the local import tree of a program.
///
/// Paths are shown relative to the directory shared by every file of the closure. A file
/// reached again through a cycle or a second importer is listed but not expanded.
use async_trait::async_trait;
use clap::Args;
use pyveil_core::deps::DependencyGraph;
use pyveil_core::python::PythonHost;
use pyveil_transform::config::ObfuscatorConfig;
use pyveil_transform::obfuscator::common_dir;
use std::collections::HashSet;
use std::error::Error;
use std::path::{Path, PathBuf};

/// Arguments for the `deps` subcommand.
#[derive(Args)]
pub struct DepsArgs {
    /// Entry file of the program.
    pub entry: PathBuf,
    /// Interpreter used for parsing; defaults to the configured one, or `python3`.
    #[arg(long)]
    python: Option<String>,
}

#[async_trait]
impl super::Command for DepsArgs {
    async fn execute(self, config_path: &Path) -> Result<(), Box<dyn Error>> {
        let python = match self.python {
            Some(python) => python,
            None if config_path.is_file() => ObfuscatorConfig::load(config_path)?.general.python,
            None => "python3".to_owned(),
        };
        let host = PythonHost::new(python);
        let graph = DependencyGraph::discover(&self.entry, &host)?;
        print!("{}", render_tree(&graph));
        Ok(())
    }
}

/// Indented tree of `graph`, starting at its entry.
pub fn render_tree(graph: &DependencyGraph) -> String {
    let closure = graph.closure();
    let common = common_dir(closure.iter().map(PathBuf::as_path));
    let mut out = String::new();
    let mut seen = HashSet::new();
    walk(graph, graph.entry(), &common, 0, &mut seen, &mut out);
    out
}

fn walk(
    graph: &DependencyGraph,
    file: &Path,
    common: &Path,
    depth: usize,
    seen: &mut HashSet<PathBuf>,
    out: &mut String,
) {
    let first = seen.insert(file.to_path_buf());
    let shown = file.strip_prefix(common).unwrap_or(file);
    out.push_str(&format!(
        "{}{}{}\n",
        "  ".repeat(depth),
        shown.display(),
        if first { "" } else { " (seen)" }
    ));
    if !first {
        return;
    }
    for child in graph.imports(file) {
        walk(graph, child, common, depth + 1, seen, out);
    }
}
