//! Follows module-level renames of one file into a file that imports it.
use crate::workspace::imports_file;
use indexmap::{IndexMap, IndexSet};
use pyveil_core::ast::{Alias, Expr, Module, Stmt};
use pyveil_core::fold::{self, Rewriter};
use pyveil_core::import_path::ImportPath;
use pyveil_core::visit::{self, Visitor};
use std::path::Path;

/// Where the importer's file sits relative to the renamed file.
struct Link<'a> {
    root: &'a Path,
    importer: &'a Path,
    target: &'a Path,
}

impl Link<'_> {
    fn reaches(&self, level: u32, module: &str) -> bool {
        imports_file(self.root, self.importer, self.target, level, module)
    }
}

/// Spellings under which the importer reaches the target module object:
/// `import pkg.util` gives `pkg.util`, `import util as u` gives `u` and
/// `from pkg import util` gives `util`.
struct Prefixes<'a> {
    link: &'a Link<'a>,
    found: IndexSet<String>,
}

impl Visitor for Prefixes<'_> {
    fn visit_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Import { names } => {
                for a in names.iter().filter(|a| self.link.reaches(0, &a.name)) {
                    self.found
                        .insert(a.asname.clone().unwrap_or_else(|| a.name.clone()));
                }
            }
            Stmt::ImportFrom {
                module,
                names,
                level,
            } => {
                let base = ImportPath::new(*level, module.clone().unwrap_or_default());
                for a in names.iter().filter(|a| a.name != "*") {
                    let child = base.child(&a.name);
                    if self.link.reaches(child.level, &child.module) {
                        self.found.insert(a.bound_name().to_owned());
                    }
                }
            }
            _ => {}
        }
        visit::walk_stmt(self, stmt);
    }
}

struct CrossFile<'a> {
    link: &'a Link<'a>,
    prefixes: IndexSet<String>,
    renames: &'a IndexMap<String, String>,
}

impl CrossFile<'_> {
    /// `from target import name [as alias]` keeps binding the old local
    /// name, so the rest of the importer stays untouched.
    fn from_import(&self, alias: Alias) -> Alias {
        match self.renames.get(&alias.name) {
            Some(new) => Alias {
                asname: Some(alias.asname.unwrap_or_else(|| alias.name.clone())),
                name: new.clone(),
            },
            None => alias,
        }
    }
}

impl Rewriter for CrossFile<'_> {
    fn rewrite_stmt(&mut self, stmt: Stmt) -> Stmt {
        match stmt {
            Stmt::ImportFrom {
                module,
                names,
                level,
            } if self
                .link
                .reaches(level, module.as_deref().unwrap_or_default()) =>
            {
                Stmt::ImportFrom {
                    names: names.into_iter().map(|a| self.from_import(a)).collect(),
                    module,
                    level,
                }
            }
            other => fold::walk_stmt(self, other),
        }
    }

    fn rewrite_expr(&mut self, expr: Expr) -> Expr {
        match fold::walk_expr(self, expr) {
            Expr::Attribute { value, attr, ctx } => {
                let renamed = value
                    .dotted()
                    .filter(|d| self.prefixes.contains(d))
                    .and_then(|_| self.renames.get(&attr).cloned());
                Expr::Attribute {
                    value,
                    attr: renamed.unwrap_or(attr),
                    ctx,
                }
            }
            other => other,
        }
    }
}

/// Rewrites `importer`'s references to the module-level names of `target`
/// listed in `renames`. `root` is where absolute imports start.
pub fn apply(
    module: Module,
    root: &Path,
    importer: &Path,
    target: &Path,
    renames: &IndexMap<String, String>,
) -> Module {
    let link = Link {
        root,
        importer,
        target,
    };
    let mut prefixes = Prefixes {
        link: &link,
        found: IndexSet::new(),
    };
    prefixes.visit_module(&module);
    let mut rewriter = CrossFile {
        link: &link,
        prefixes: prefixes.found,
        renames,
    };
    rewriter.rewrite_module(module)
}
