//! Symbol renaming.
//!
//! The generator scans one file and assigns a fresh name to every symbol it
//! may safely rename. The applicator rewrites that file's references through
//! a scope stack. Module-level renames are then handed to every other file of
//! the run as [`SiblingEdit`]s, which rewrite imports of the renamed file.
pub mod applicator;
pub mod cross_file;
pub mod generator;

use crate::naming::{NamingTemplate, SymbolKind};
use crate::{PassContext, SiblingEdit, Transform};
use indexmap::IndexMap;
use pyveil_core::ast::Module;
use pyveil_core::scope::ScopeId;
use pyveil_utils::errors::{TemplateError, TransformError};
use tracing::debug;

/// Identity of a renamable symbol within one file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SymbolKey {
    /// A module-level binding, the only kind other files can see.
    Module(String),
    /// A class member or instance field, reached through `obj.name`.
    Attribute(String),
    /// A parameter or local of one function.
    Local { scope: ScopeId, name: String },
}

impl SymbolKey {
    pub fn name(&self) -> &str {
        match self {
            Self::Module(n) | Self::Attribute(n) | Self::Local { name: n, .. } => n,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Renamed {
    pub kind: SymbolKind,
    pub name: String,
}

/// Original symbol to generated name, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolMapping {
    entries: IndexMap<SymbolKey, Renamed>,
}

impl SymbolMapping {
    pub fn insert(&mut self, key: SymbolKey, kind: SymbolKind, name: String) {
        self.entries.entry(key).or_insert(Renamed { kind, name });
    }

    pub fn contains(&self, key: &SymbolKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &SymbolKey) -> Option<&str> {
        self.entries.get(key).map(|r| r.name.as_str())
    }

    pub fn module(&self, name: &str) -> Option<&str> {
        self.get(&SymbolKey::Module(name.to_owned()))
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.get(&SymbolKey::Attribute(name.to_owned()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SymbolKey, &Renamed)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Renames of module-level bindings, as other files see them.
    pub fn module_renames(&self) -> IndexMap<String, String> {
        self.entries
            .iter()
            .filter_map(|(k, r)| match k {
                SymbolKey::Module(n) => Some((n.clone(), r.name.clone())),
                _ => None,
            })
            .collect()
    }
}

/// The renaming pass.
#[derive(Debug, Clone)]
pub struct Renamer {
    template: String,
}

impl Renamer {
    pub fn new(template: &str) -> Result<Self, TemplateError> {
        NamingTemplate::parse(template)?;
        Ok(Self {
            template: template.to_owned(),
        })
    }
}

impl Transform for Renamer {
    fn name(&self) -> &'static str {
        "renamer"
    }

    fn edits_siblings(&self) -> bool {
        true
    }

    fn apply(&self, module: Module, ctx: &mut PassContext<'_>) -> Result<Module, TransformError> {
        let mut template = NamingTemplate::parse(&self.template)?;
        let mapping = generator::generate(&module, ctx.path, ctx.workspace, &mut template)?;
        debug!(path = %ctx.path.display(), symbols = mapping.len(), "generated symbol mapping");
        if mapping.is_empty() {
            return Ok(module);
        }
        let module = applicator::apply(module, &mapping);

        let Some(workspace) = ctx.workspace else {
            return Ok(module);
        };
        let renames = mapping.module_renames();
        if renames.is_empty() {
            return Ok(module);
        }
        for other in workspace.others(ctx.path) {
            let importer = other.to_path_buf();
            let target = ctx.path.to_path_buf();
            let root = workspace.root().to_path_buf();
            let renames = renames.clone();
            ctx.edits.push(SiblingEdit::new(other.to_path_buf(), move |m| {
                Ok(cross_file::apply(m, &root, &importer, &target, &renames))
            }));
        }
        Ok(module)
    }
}
