//! Import spellings between files of one source tree.
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// How one file spells an import of another: `level` leading dots followed
/// by a dotted module path (possibly empty, as in `from . import x`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImportPath {
    pub level: u32,
    pub module: String,
}

impl ImportPath {
    pub fn new(level: u32, module: impl Into<String>) -> Self {
        Self {
            level,
            module: module.into(),
        }
    }

    /// Whether `from <dots><module> import ...` written with `level` dots
    /// names the same file. A target in the importer's own directory may
    /// be spelled with or without a single leading dot.
    pub fn matches(&self, level: u32, module: &str) -> bool {
        if self.module != module {
            return false;
        }
        self.level == level || (self.level == 0 && level == 1 && !module.is_empty())
    }

    /// The path with `name` appended, as `from <self> import <name>` would
    /// reach a submodule.
    pub fn child(&self, name: &str) -> Self {
        let module = if self.module.is_empty() {
            name.to_owned()
        } else {
            format!("{}.{name}", self.module)
        };
        Self::new(self.level, module)
    }
}

impl fmt::Display for ImportPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", ".".repeat(self.level as usize), self.module)
    }
}

fn normal(path: &Path) -> Vec<String> {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect()
}

fn module_parts(mut parts: Vec<String>) -> Vec<String> {
    if let Some(last) = parts.last_mut() {
        if let Some(stem) = last.strip_suffix(".py") {
            *last = stem.to_owned();
        }
    }
    if parts.last().is_some_and(|l| l == "__init__") {
        parts.pop();
    }
    parts
}

/// Computes how `from` imports `to`. Both paths must be absolute (or share
/// the same base). Targets in or below the importer's directory become
/// plain dotted paths; anything above needs one dot per parent level plus
/// one for the relative import itself.
pub fn compute_import_path(from: &Path, to: &Path) -> ImportPath {
    let from_dir = normal(from.parent().unwrap_or(Path::new("")));
    let to_parts = normal(to);
    let common = from_dir
        .iter()
        .zip(&to_parts)
        .take_while(|(a, b)| a == b)
        .count();
    let ups = (from_dir.len() - common) as u32;
    let down = module_parts(to_parts[common..].to_vec());
    let module = down.join(".");
    match (ups, module.is_empty()) {
        (0, false) => ImportPath::new(0, module),
        (0, true) => ImportPath::new(1, module),
        (n, _) => ImportPath::new(n + 1, module),
    }
}

/// Dotted module path of `file` relative to a source root, as an absolute
/// import from anywhere under that root would spell it.
pub fn absolute_import_path(root: &Path, file: &Path) -> Option<ImportPath> {
    let rel = file.strip_prefix(root).ok()?;
    let parts = module_parts(normal(rel));
    (!parts.is_empty()).then(|| ImportPath::new(0, parts.join(".")))
}

/// Candidate files for a dotted module path under `base`.
pub fn module_candidates(base: &Path, module: &str) -> [PathBuf; 2] {
    let mut dir = base.to_path_buf();
    for part in module.split('.').filter(|p| !p.is_empty()) {
        dir.push(part);
    }
    let file = dir.with_extension("py");
    [file, dir.join("__init__.py")]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sibling_is_plain() {
        let p = compute_import_path(Path::new("/src/a.py"), Path::new("/src/b.py"));
        assert_eq!(p, ImportPath::new(0, "b"));
        assert!(p.matches(0, "b"));
        assert!(p.matches(1, "b"));
        assert!(!p.matches(2, "b"));
    }

    #[test]
    fn nested_package() {
        let p = compute_import_path(Path::new("/src/main.py"), Path::new("/src/pkg/util.py"));
        assert_eq!(p.to_string(), "pkg.util");
        let init = compute_import_path(Path::new("/src/main.py"), Path::new("/src/pkg/__init__.py"));
        assert_eq!(init.to_string(), "pkg");
    }

    #[test]
    fn parent_directories_add_dots() {
        let p = compute_import_path(Path::new("/src/pkg/sub/x.py"), Path::new("/src/pkg/y.py"));
        assert_eq!(p, ImportPath::new(2, "y"));
        let q = compute_import_path(Path::new("/src/pkg/sub/x.py"), Path::new("/src/other/z.py"));
        assert_eq!(q.to_string(), "...other.z");
    }

    #[test]
    fn own_package_init() {
        let p = compute_import_path(Path::new("/src/pkg/a.py"), Path::new("/src/pkg/__init__.py"));
        assert_eq!(p, ImportPath::new(1, ""));
        assert_eq!(p.child("a"), ImportPath::new(1, "a"));
    }

    #[test]
    fn absolute_from_root() {
        let p = absolute_import_path(Path::new("/src"), Path::new("/src/pkg/mod.py"));
        assert_eq!(p, Some(ImportPath::new(0, "pkg.mod")));
        assert_eq!(absolute_import_path(Path::new("/src"), Path::new("/elsewhere/m.py")), None);
    }
}
