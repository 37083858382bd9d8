//! Facts about every file of a run, gathered before any pass rewrites them.
use indexmap::IndexMap;
use pyveil_core::ast::{Expr, Keyword, Module, Pattern, Stmt};
use pyveil_core::import_path::{absolute_import_path, compute_import_path};
use pyveil_core::scope::Bindings;
use pyveil_core::visit::{self, Visitor};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// What the renamer needs to know about one file.
#[derive(Debug, Clone, Default)]
pub struct FileIndex {
    /// Attribute names accessed or defined as class members.
    pub attributes: HashSet<String>,
    /// Names used as keyword arguments.
    pub keywords: HashSet<String>,
    /// `from <level dots><module> import *` statements.
    pub star_imports: Vec<(u32, String)>,
}

impl FileIndex {
    pub fn of(module: &Module) -> Self {
        let mut index = Self::default();
        index.visit_module(module);
        index
    }
}

impl Visitor for FileIndex {
    fn visit_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::ClassDef(c) => {
                self.attributes
                    .extend(Bindings::of_class(c).names.into_keys());
            }
            Stmt::ImportFrom {
                module,
                names,
                level,
            } if names.iter().any(|a| a.name == "*") => {
                self.star_imports
                    .push((*level, module.clone().unwrap_or_default()));
            }
            _ => {}
        }
        visit::walk_stmt(self, stmt);
    }

    fn visit_expr(&mut self, expr: &Expr) {
        if let Expr::Attribute { attr, .. } = expr {
            self.attributes.insert(attr.clone());
        }
        visit::walk_expr(self, expr);
    }

    fn visit_keyword(&mut self, keyword: &Keyword) {
        if let Some(k) = &keyword.arg {
            self.keywords.insert(k.clone());
        }
        self.visit_expr(&keyword.value);
    }

    fn visit_pattern(&mut self, pattern: &Pattern) {
        if let Pattern::MatchClass { kwd_attrs, .. } = pattern {
            self.attributes.extend(kwd_attrs.iter().cloned());
        }
        visit::walk_pattern(self, pattern);
    }
}

/// Whether `from <level dots><module> import ...` written in `importer`
/// refers to `target`. Absolute spellings are resolved against `root`.
pub fn imports_file(root: &Path, importer: &Path, target: &Path, level: u32, module: &str) -> bool {
    compute_import_path(importer, target).matches(level, module)
        || (level == 0 && absolute_import_path(root, target).is_some_and(|p| p.module == module))
}

/// Read-only snapshot of every file in a run.
#[derive(Debug, Clone, Default)]
pub struct WorkspaceIndex {
    root: PathBuf,
    files: IndexMap<PathBuf, FileIndex>,
}

impl WorkspaceIndex {
    /// Indexes `files`. `root` is the directory absolute imports start from.
    pub fn build<'a>(root: &Path, files: impl IntoIterator<Item = (&'a Path, &'a Module)>) -> Self {
        Self {
            root: root.to_path_buf(),
            files: files
                .into_iter()
                .map(|(p, m)| (p.to_path_buf(), FileIndex::of(m)))
                .collect(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.files.keys().map(PathBuf::as_path)
    }

    /// Every file except `path`.
    pub fn others<'a>(&'a self, path: &'a Path) -> impl Iterator<Item = &'a Path> + 'a {
        self.paths().filter(move |p| *p != path)
    }

    pub fn get(&self, path: &Path) -> Option<&FileIndex> {
        self.files.get(path)
    }

    /// Whether a file other than `path` accesses attribute `name`.
    pub fn attribute_elsewhere(&self, path: &Path, name: &str) -> bool {
        self.files
            .iter()
            .any(|(p, f)| p != path && f.attributes.contains(name))
    }

    /// Whether any file passes `name` as a keyword argument.
    pub fn keyword_anywhere(&self, name: &str) -> bool {
        self.files.values().any(|f| f.keywords.contains(name))
    }

    /// Whether another file star-imports `path`.
    pub fn is_star_imported(&self, path: &Path) -> bool {
        self.files.iter().any(|(importer, f)| {
            importer != path
                && f.star_imports
                    .iter()
                    .any(|(level, module)| imports_file(&self.root, importer, path, *level, module))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pyveil_core::ast::{Alias, ClassDef};

    fn star_from(module: &str, level: u32) -> Stmt {
        Stmt::ImportFrom {
            module: Some(module.into()),
            names: vec![Alias {
                name: "*".into(),
                asname: None,
            }],
            level,
        }
    }

    #[test]
    fn indexes_attributes_keywords_and_stars() {
        let class = Stmt::ClassDef(ClassDef {
            name: "C".into(),
            bases: vec![],
            keywords: vec![],
            body: vec![Stmt::assign("member", Expr::name("None"))],
            decorator_list: vec![],
        });
        let call = Stmt::expr(Expr::Call {
            func: Box::new(Expr::attr(Expr::name("o"), "field")),
            args: vec![],
            keywords: vec![Keyword {
                arg: Some("flag".into()),
                value: Expr::name("True"),
            }],
        });
        let a = Module::new(vec![class, call, star_from("b", 0)]);
        let b = Module::new(vec![Stmt::Pass]);
        let ws = WorkspaceIndex::build(
            Path::new("/src"),
            [
                (Path::new("/src/a.py"), &a),
                (Path::new("/src/b.py"), &b),
            ],
        );

        let fa = ws.get(Path::new("/src/a.py")).unwrap();
        assert!(fa.attributes.contains("member"));
        assert!(fa.attributes.contains("field"));
        assert!(ws.keyword_anywhere("flag"));
        assert!(ws.attribute_elsewhere(Path::new("/src/b.py"), "field"));
        assert!(!ws.attribute_elsewhere(Path::new("/src/a.py"), "field"));
        assert!(ws.is_star_imported(Path::new("/src/b.py")));
        assert!(!ws.is_star_imported(Path::new("/src/a.py")));
    }

    #[test]
    fn relative_and_absolute_spellings() {
        let root = Path::new("/src");
        let importer = Path::new("/src/pkg/sub/x.py");
        let target = Path::new("/src/pkg/y.py");
        assert!(imports_file(root, importer, target, 2, "y"));
        assert!(imports_file(root, importer, target, 0, "pkg.y"));
        assert!(!imports_file(root, importer, target, 0, "y"));
    }
}
