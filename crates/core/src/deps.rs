/// Module for discovering the local-import dependency graph of a program.
///
/// Starting from an entry file, every reachable source file is parsed once and
/// its `import` / `from ... import` statements are resolved against the file
/// system. Only imports that resolve to files on disk become edges; everything
/// else (standard library, installed packages) is ignored. The parsed trees are
/// kept so the pipeline does not have to parse the files a second time.
use crate::ast::{Module, Stmt};
use crate::host::SourceCodec;
use crate::import_path::module_candidates;
use crate::visit::{self, Visitor};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;
use pyveil_utils::errors::DependencyError;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Graph of source files connected by local imports.
///
/// Nodes are canonical absolute paths; an edge `a -> b` means `a` imports `b`.
/// Cycles are allowed and common (`x` imports `y` which imports `x`).
#[derive(Debug)]
pub struct DependencyGraph {
    /// The import graph itself.
    pub graph: DiGraph<PathBuf, ()>,
    /// Node lookup by canonical path.
    index: HashMap<PathBuf, NodeIndex>,
    /// Parsed tree of every node.
    modules: HashMap<PathBuf, Module>,
    /// The entry file's node.
    entry: NodeIndex,
}

/// One import statement reduced to what resolution needs.
#[derive(Debug, Clone, PartialEq)]
enum ImportRef {
    /// `import a.b.c`
    Plain(String),
    /// `from <level dots><module> import names...`
    From {
        level: u32,
        module: String,
        names: Vec<String>,
    },
}

#[derive(Default)]
struct ImportCollector {
    refs: Vec<ImportRef>,
}

impl Visitor for ImportCollector {
    fn visit_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Import { names } => {
                self.refs
                    .extend(names.iter().map(|a| ImportRef::Plain(a.name.clone())));
            }
            Stmt::ImportFrom {
                module,
                names,
                level,
            } => self.refs.push(ImportRef::From {
                level: *level,
                module: module.clone().unwrap_or_default(),
                names: names
                    .iter()
                    .filter(|a| a.name != "*")
                    .map(|a| a.name.clone())
                    .collect(),
            }),
            _ => visit::walk_stmt(self, stmt),
        }
    }
}

fn canonical(path: &Path) -> Result<PathBuf, DependencyError> {
    path.canonicalize().map_err(|source| DependencyError::Read {
        path: path.display().to_string(),
        source,
    })
}

fn existing(base: &Path, module: &str) -> Option<PathBuf> {
    if module.is_empty() {
        return None;
    }
    module_candidates(base, module)
        .into_iter()
        .find(|p| p.is_file())
}

/// Resolves one import of `file` to the local files it executes.
///
/// `import a.b` runs `a/__init__.py` (if present) before `a/b.py`, so parent
/// packages are included. `from pkg import name` may name a submodule.
fn resolve(file_dir: &Path, entry_dir: &Path, import: &ImportRef) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let mut push = |p: PathBuf| {
        if !out.contains(&p) {
            out.push(p);
        }
    };
    match import {
        ImportRef::Plain(name) => {
            for base in [file_dir, entry_dir] {
                let parts: Vec<&str> = name.split('.').collect();
                let found: Vec<PathBuf> = (1..=parts.len())
                    .filter_map(|n| existing(base, &parts[..n].join(".")))
                    .collect();
                if !found.is_empty() {
                    found.into_iter().for_each(&mut push);
                    break;
                }
            }
        }
        ImportRef::From {
            level,
            module,
            names,
        } => {
            let bases: Vec<PathBuf> = if *level == 0 {
                vec![file_dir.to_path_buf(), entry_dir.to_path_buf()]
            } else {
                let mut dir = file_dir.to_path_buf();
                for _ in 1..*level {
                    if !dir.pop() {
                        return out;
                    }
                }
                vec![dir]
            };
            for base in bases {
                let target = existing(&base, module);
                let package = if module.is_empty() {
                    base.clone()
                } else {
                    module_candidates(&base, module)[1]
                        .parent()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| base.clone())
                };
                let subs: Vec<PathBuf> = names
                    .iter()
                    .filter_map(|n| existing(&package, n))
                    .collect();
                if target.is_some() || !subs.is_empty() {
                    target.into_iter().chain(subs).for_each(&mut push);
                    break;
                }
            }
        }
    }
    out
}

impl DependencyGraph {
    /// Parses `entry` and every local file it transitively imports.
    ///
    /// Files are visited breadth-first and parsed exactly once, so cyclic
    /// imports terminate.
    pub fn discover(entry: &Path, codec: &dyn SourceCodec) -> Result<Self, DependencyError> {
        if !entry.is_file() {
            return Err(DependencyError::NotFound(entry.display().to_string()));
        }
        let entry = canonical(entry)?;
        let entry_dir = entry.parent().map(Path::to_path_buf).unwrap_or_default();

        let mut graph = DiGraph::new();
        let mut index = HashMap::new();
        let mut modules = HashMap::new();
        let root = graph.add_node(entry.clone());
        index.insert(entry.clone(), root);

        let mut queue = VecDeque::from([entry.clone()]);
        while let Some(file) = queue.pop_front() {
            let source = std::fs::read_to_string(&file).map_err(|source| DependencyError::Read {
                path: file.display().to_string(),
                source,
            })?;
            let module = codec.parse(&source, &file.display().to_string())?;

            let mut collector = ImportCollector::default();
            collector.visit_module(&module);
            modules.insert(file.clone(), module);

            let from = index[&file];
            let file_dir = file.parent().map(Path::to_path_buf).unwrap_or_default();
            for import in &collector.refs {
                for target in resolve(&file_dir, &entry_dir, import) {
                    let target = canonical(&target)?;
                    if target == file {
                        continue;
                    }
                    let to = match index.get(&target) {
                        Some(&n) => n,
                        None => {
                            trace!(from = %file.display(), to = %target.display(), "new local import");
                            let n = graph.add_node(target.clone());
                            index.insert(target.clone(), n);
                            queue.push_back(target);
                            n
                        }
                    };
                    graph.update_edge(from, to, ());
                }
            }
        }

        debug!(
            files = graph.node_count(),
            edges = graph.edge_count(),
            "dependency graph discovered"
        );
        Ok(Self {
            graph,
            index,
            modules,
            entry: root,
        })
    }

    pub fn entry(&self) -> &Path {
        &self.graph[self.entry]
    }

    /// Every file reachable from the entry, each exactly once, in
    /// depth-first order starting with the entry itself.
    pub fn closure(&self) -> Vec<PathBuf> {
        let mut dfs = Dfs::new(&self.graph, self.entry);
        let mut out = Vec::with_capacity(self.graph.node_count());
        while let Some(n) = dfs.next(&self.graph) {
            out.push(self.graph[n].clone());
        }
        out
    }

    /// Files directly imported by `file`, in discovery order.
    pub fn imports(&self, file: &Path) -> Vec<&Path> {
        let Some(&n) = self.index.get(file) else {
            return Vec::new();
        };
        let mut out: Vec<_> = self
            .graph
            .neighbors(n)
            .map(|m| (m, self.graph[m].as_path()))
            .collect();
        // neighbors() yields the most recently added edge first
        out.sort_by_key(|(m, _)| m.index());
        out.into_iter().map(|(_, p)| p).collect()
    }

    pub fn module(&self, file: &Path) -> Option<&Module> {
        self.modules.get(file)
    }

    /// Consumes the graph, returning the closure with each file's tree.
    pub fn into_modules(mut self) -> Vec<(PathBuf, Module)> {
        self.closure()
            .into_iter()
            .filter_map(|p| self.modules.remove(&p).map(|m| (p, m)))
            .collect()
    }
}
