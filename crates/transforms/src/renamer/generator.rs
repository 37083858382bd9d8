//! Builds the [`SymbolMapping`] of one file.
//!
//! Scanning walks the tree in source order and records every candidate
//! declaration. Exclusions are only known once the whole file has been seen
//! (a class defined late can poison a member name used early), so names are
//! generated in a second step over the recorded candidates.
use super::{SymbolKey, SymbolMapping};
use crate::naming::{NamingTemplate, SymbolKind};
use crate::workspace::{FileIndex, WorkspaceIndex};
use pyveil_core::ast::*;
use pyveil_core::names::{is_builtin, is_dunder, is_keyword, is_reserved_attribute};
use pyveil_core::scope::{BindingKind, Bindings, ScopeNamer};
use pyveil_core::visit::{self, IdentifierCollector, Visitor};
use pyveil_utils::errors::TemplateError;
use std::collections::HashSet;
use std::path::Path;

/// Facts about the file that decide what must keep its name.
#[derive(Debug, Default)]
struct FileFacts {
    /// Names bound by an import anywhere in the file.
    import_bound: HashSet<String>,
    /// Attributes on chains rooted at an import-bound name.
    import_rooted: HashSet<String>,
    /// String literal values.
    strings: HashSet<String>,
    /// Entries of a module-level `__all__`.
    exported: HashSet<String>,
}

impl FileFacts {
    fn of(module: &Module) -> Self {
        let mut facts = Self::default();
        let mut imports = ImportNames::default();
        imports.visit_module(module);
        facts.import_bound = imports.0;
        facts.visit_module(module);
        for stmt in &module.body {
            let (targets, value): (Vec<&Expr>, &Expr) = match stmt {
                Stmt::Assign { targets, value, .. } => (targets.iter().collect(), value.as_ref()),
                Stmt::AugAssign { target, value, .. } => (vec![target.as_ref()], value.as_ref()),
                Stmt::AnnAssign {
                    target,
                    value: Some(value),
                    ..
                } => (vec![target.as_ref()], value.as_ref()),
                _ => continue,
            };
            if targets
                .iter()
                .any(|t| matches!(t, Expr::Name { id, .. } if id == "__all__"))
            {
                let mut strings = StringLiterals::default();
                strings.visit_expr(value);
                facts.exported.extend(strings.0);
            }
        }
        facts
    }
}

impl Visitor for FileFacts {
    fn visit_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Attribute { attr, .. } => {
                if expr
                    .root_name()
                    .is_some_and(|root| self.import_bound.contains(root))
                {
                    self.import_rooted.insert(attr.clone());
                }
            }
            Expr::Constant {
                value: Constant::Str(s),
                ..
            } => {
                self.strings.insert(s.clone());
            }
            _ => {}
        }
        visit::walk_expr(self, expr);
    }
}

#[derive(Default)]
struct ImportNames(HashSet<String>);

impl Visitor for ImportNames {
    fn visit_alias(&mut self, alias: &Alias) {
        if alias.name != "*" {
            self.0.insert(alias.bound_name().to_owned());
        }
    }
}

#[derive(Default)]
struct StringLiterals(Vec<String>);

impl Visitor for StringLiterals {
    fn visit_expr(&mut self, expr: &Expr) {
        if let Expr::Constant {
            value: Constant::Str(s),
            ..
        } = expr
        {
            self.0.push(s.clone());
        }
        visit::walk_expr(self, expr);
    }
}

/// Attributes assigned through a method's first parameter (`self.x = ...`).
struct InstanceFields<'a> {
    receiver: &'a str,
    fields: Vec<String>,
}

impl Visitor for InstanceFields<'_> {
    fn visit_expr(&mut self, expr: &Expr) {
        if let Expr::Attribute {
            value,
            attr,
            ctx: ExprContext::Store | ExprContext::Del,
        } = expr
        {
            if matches!(value.as_ref(), Expr::Name { id, .. } if id == self.receiver)
                && !self.fields.contains(attr)
            {
                self.fields.push(attr.clone());
            }
        }
        visit::walk_expr(self, expr);
    }
}

fn instance_fields(f: &FunctionDef) -> Vec<String> {
    let Some(receiver) = f.args.posonlyargs.iter().chain(&f.args.args).next() else {
        return Vec::new();
    };
    let mut v = InstanceFields {
        receiver: &receiver.arg,
        fields: Vec::new(),
    };
    v.visit_body(&f.body);
    v.fields
}

/// `def` and `class` statements of a body, in the order a tree walk meets
/// them, without entering their own bodies.
pub(crate) fn nested_defs<'a>(body: &'a [Stmt], out: &mut Vec<&'a Stmt>) {
    for s in body {
        match s {
            Stmt::FunctionDef(_) | Stmt::AsyncFunctionDef(_) | Stmt::ClassDef(_) => out.push(s),
            Stmt::For(f) | Stmt::AsyncFor(f) => {
                nested_defs(&f.body, out);
                nested_defs(&f.orelse, out);
            }
            Stmt::While { body, orelse, .. } | Stmt::If { body, orelse, .. } => {
                nested_defs(body, out);
                nested_defs(orelse, out);
            }
            Stmt::With(w) | Stmt::AsyncWith(w) => nested_defs(&w.body, out),
            Stmt::Match { cases, .. } => {
                for c in cases {
                    nested_defs(&c.body, out);
                }
            }
            Stmt::Try(t) | Stmt::TryStar(t) => {
                nested_defs(&t.body, out);
                for h in &t.handlers {
                    nested_defs(&h.body, out);
                }
                nested_defs(&t.orelse, out);
                nested_defs(&t.finalbody, out);
            }
            _ => {}
        }
    }
}

const fn symbol_kind(kind: BindingKind) -> SymbolKind {
    match kind {
        BindingKind::Function => SymbolKind::Routine,
        BindingKind::Class => SymbolKind::Type,
        BindingKind::Param => SymbolKind::Parameter,
        _ => SymbolKind::Variable,
    }
}

#[derive(Clone, Copy)]
enum Owner {
    Module,
    Class { renamable: bool },
    Function,
}

struct Scanner {
    namer: ScopeNamer,
    candidates: Vec<(SymbolKey, SymbolKind)>,
    /// Class names whose members may be renamed.
    renamable_classes: HashSet<String>,
    /// Members and fields of classes that may not be renamed.
    poisoned: HashSet<String>,
}

impl Scanner {
    fn declare(&mut self, key: SymbolKey, kind: SymbolKind) {
        self.candidates.push((key, kind));
    }

    /// Only classes built purely from this file's own renamable classes can
    /// have their members renamed; anything else may be driven by code we
    /// cannot see.
    fn is_renamable(&self, c: &ClassDef) -> bool {
        c.keywords.is_empty()
            && c.decorator_list.is_empty()
            && c.bases.iter().all(|b| {
                matches!(b, Expr::Name { id, .. }
                    if id == "object" || self.renamable_classes.contains(id))
            })
    }

    fn scan_module(&mut self, module: &Module) {
        for (name, kind) in &Bindings::of_module(module).names {
            if *kind != BindingKind::Import {
                self.declare(SymbolKey::Module(name.clone()), symbol_kind(*kind));
            }
        }
        self.scan_nested(&module.body, Owner::Module);
    }

    fn scan_nested(&mut self, body: &[Stmt], owner: Owner) {
        let mut defs = Vec::new();
        nested_defs(body, &mut defs);
        for def in defs {
            match def {
                Stmt::FunctionDef(f) | Stmt::AsyncFunctionDef(f) => self.scan_function(f, owner),
                Stmt::ClassDef(c) => self.scan_class(c),
                _ => {}
            }
        }
    }

    fn scan_function(&mut self, f: &FunctionDef, owner: Owner) {
        let scope = self.namer.enter(&f.name);
        let bindings = Bindings::of_function(f);
        let in_poisoned_class = matches!(owner, Owner::Class { renamable: false });

        for (name, kind) in &bindings.names {
            let key = SymbolKey::Local {
                scope: scope.clone(),
                name: name.clone(),
            };
            match kind {
                BindingKind::Param if in_poisoned_class => {}
                BindingKind::Import => {}
                _ if bindings.globals.contains(name) => {
                    self.declare(SymbolKey::Module(name.clone()), symbol_kind(*kind));
                }
                _ if bindings.is_local(name) => self.declare(key, symbol_kind(*kind)),
                _ => {}
            }
        }

        if let Owner::Class { renamable } = owner {
            let fields = instance_fields(f);
            if renamable {
                for field in fields {
                    self.declare(SymbolKey::Attribute(field), SymbolKind::Variable);
                }
            } else {
                self.poisoned.extend(fields);
            }
        }

        self.scan_nested(&f.body, Owner::Function);
        self.namer.exit();
    }

    fn scan_class(&mut self, c: &ClassDef) {
        let renamable = self.is_renamable(c);
        let members = Bindings::of_class(c);
        if renamable {
            self.renamable_classes.insert(c.name.clone());
            for (name, kind) in &members.names {
                if *kind != BindingKind::Import {
                    self.declare(SymbolKey::Attribute(name.clone()), symbol_kind(*kind));
                }
            }
        } else {
            self.renamable_classes.remove(&c.name);
            self.poisoned.extend(members.names.into_keys());
        }
        self.namer.enter(&c.name);
        self.scan_nested(&c.body, Owner::Class { renamable });
        self.namer.exit();
    }
}

/// Everything that decides whether a candidate keeps its name.
struct Exclusions<'a> {
    path: &'a Path,
    facts: FileFacts,
    own: FileIndex,
    workspace: Option<&'a WorkspaceIndex>,
    poisoned: HashSet<String>,
    star_imported: bool,
}

impl Exclusions<'_> {
    fn keyword_used(&self, name: &str) -> bool {
        match self.workspace {
            Some(ws) => ws.keyword_anywhere(name),
            None => self.own.keywords.contains(name),
        }
    }

    fn excluded(&self, key: &SymbolKey, kind: SymbolKind) -> bool {
        let name = key.name();
        if is_dunder(name) || self.facts.import_bound.contains(name) {
            return true;
        }
        match key {
            SymbolKey::Module(_) => self.star_imported || self.facts.exported.contains(name),
            SymbolKey::Attribute(_) => {
                is_reserved_attribute(name)
                    || self.poisoned.contains(name)
                    || self.facts.import_rooted.contains(name)
                    || self.facts.strings.contains(name)
                    || self.keyword_used(name)
                    || self
                        .workspace
                        .is_some_and(|ws| ws.attribute_elsewhere(self.path, name))
            }
            SymbolKey::Local { .. } => kind == SymbolKind::Parameter && self.keyword_used(name),
        }
    }
}

/// Scans `module` and names every symbol that may be renamed.
pub fn generate(
    module: &Module,
    path: &Path,
    workspace: Option<&WorkspaceIndex>,
    template: &mut NamingTemplate,
) -> Result<SymbolMapping, TemplateError> {
    let mut scanner = Scanner {
        namer: ScopeNamer::default(),
        candidates: Vec::new(),
        renamable_classes: HashSet::new(),
        poisoned: HashSet::new(),
    };
    scanner.scan_module(module);

    let exclusions = Exclusions {
        path,
        facts: FileFacts::of(module),
        own: FileIndex::of(module),
        workspace,
        poisoned: scanner.poisoned,
        star_imported: workspace.is_some_and(|ws| ws.is_star_imported(path)),
    };

    let mut taken = IdentifierCollector::collect(module);
    let mut mapping = SymbolMapping::default();
    for (key, kind) in scanner.candidates {
        if mapping.contains(&key) || exclusions.excluded(&key, kind) {
            continue;
        }
        let name = template.fresh(kind, |n| {
            taken.contains(n) || is_keyword(n) || is_builtin(n)
        })?;
        taken.insert(name.clone());
        mapping.insert(key, kind, name);
    }
    Ok(mapping)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(name: &str, params: &[&str], body: Vec<Stmt>) -> Stmt {
        Stmt::FunctionDef(FunctionDef {
            name: name.into(),
            args: Box::new(Arguments {
                args: params.iter().map(|p| Arg::new(*p)).collect(),
                ..Default::default()
            }),
            body,
            decorator_list: vec![],
            returns: None,
            type_comment: None,
        })
    }

    fn class(name: &str, bases: Vec<Expr>, body: Vec<Stmt>) -> Stmt {
        Stmt::ClassDef(ClassDef {
            name: name.into(),
            bases,
            keywords: vec![],
            body,
            decorator_list: vec![],
        })
    }

    fn run(module: &Module) -> SymbolMapping {
        let mut t = NamingTemplate::parse("{kind}{n}").unwrap();
        generate(module, Path::new("/src/m.py"), None, &mut t).unwrap()
    }

    #[test]
    fn declarations_in_source_order() {
        let module = Module::new(vec![
            Stmt::Import {
                names: vec![Alias {
                    name: "os".into(),
                    asname: None,
                }],
            },
            def(
                "greet",
                &["who"],
                vec![Stmt::Return {
                    value: Some(Box::new(Expr::name("who"))),
                }],
            ),
            Stmt::assign("count", Expr::constant(Constant::int(0))),
            Stmt::assign("__version__", Expr::constant(Constant::str("1"))),
        ]);
        let m = run(&module);
        assert_eq!(m.module("greet"), Some("method0"));
        assert_eq!(m.module("count"), Some("var0"));
        assert_eq!(m.module("os"), None);
        assert_eq!(m.module("__version__"), None);
        let local: Vec<_> = m
            .iter()
            .filter(|(k, _)| matches!(k, SymbolKey::Local { .. }))
            .map(|(k, r)| (k.name().to_owned(), r.name.clone()))
            .collect();
        assert_eq!(local, [("who".to_owned(), "arg0".to_owned())]);
    }

    #[test]
    fn deterministic() {
        let module = Module::new(vec![
            class("A", vec![], vec![def("run_it", &["self"], vec![Stmt::Pass])]),
            def("f", &["x", "y"], vec![Stmt::Pass]),
        ]);
        assert_eq!(run(&module), run(&module));
    }

    #[test]
    fn foreign_bases_poison_members() {
        let module = Module::new(vec![
            class(
                "Local",
                vec![Expr::name("object")],
                vec![def(
                    "__init__",
                    &["self"],
                    vec![Stmt::Assign {
                        targets: vec![Expr::Attribute {
                            value: Box::new(Expr::name("self")),
                            attr: "size".into(),
                            ctx: ExprContext::Store,
                        }],
                        value: Box::new(Expr::constant(Constant::int(1))),
                        type_comment: None,
                    }],
                )],
            ),
            class("Child", vec![Expr::name("Local")], vec![def("grow", &["self"], vec![Stmt::Pass])]),
            class(
                "Thread",
                vec![Expr::attr(Expr::name("threading"), "Thread")],
                vec![def("tick", &["self", "n"], vec![Stmt::Pass])],
            ),
        ]);
        let m = run(&module);
        assert!(m.attribute("size").is_some());
        assert!(m.attribute("grow").is_some());
        assert!(m.attribute("tick").is_none());
        assert!(m.attribute("__init__").is_none());
        // parameters of methods on foreign subclasses keep their names
        assert!(!m.iter().any(|(k, _)| k.name() == "n"));
        assert!(m.module("Thread").is_some());
    }

    #[test]
    fn keyword_uses_and_strings_block_renames() {
        let module = Module::new(vec![
            def("f", &["flag"], vec![Stmt::Pass]),
            Stmt::expr(Expr::Call {
                func: Box::new(Expr::name("f")),
                args: vec![],
                keywords: vec![Keyword {
                    arg: Some("flag".into()),
                    value: Expr::name("True"),
                }],
            }),
            class("C", vec![], vec![Stmt::assign("label", Expr::constant(Constant::int(1)))]),
            Stmt::expr(Expr::call(
                Expr::name("getattr"),
                vec![Expr::name("C"), Expr::constant(Constant::str("label"))],
            )),
        ]);
        let m = run(&module);
        assert!(!m.iter().any(|(k, _)| k.name() == "flag"));
        assert!(m.attribute("label").is_none());
        assert!(m.module("f").is_some());
    }

    #[test]
    fn generated_names_avoid_existing_identifiers() {
        let module = Module::new(vec![
            Stmt::assign("method0", Expr::constant(Constant::int(1))),
            def("g", &[], vec![Stmt::Pass]),
        ]);
        let m = run(&module);
        assert_eq!(m.module("g"), Some("method1"));
        assert_eq!(m.module("method0"), Some("var0"));
    }
}
