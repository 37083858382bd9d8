//! Name binding and resolution.
//!
//! [`Bindings`] lists what one scope binds, in first-binding order.
//! [`ScopeStack`] resolves a name the way the host's compiler does: class
//! bodies are only visible to their own statements, lambdas and
//! comprehensions shadow outer bindings, and `global`/`nonlocal` redirect
//! lookups. [`ScopeNamer`] hands out stable identifiers for function scopes
//! so that separate walks over the same tree agree on them.
use crate::ast::*;
use crate::visit::{self, Visitor};
use indexmap::{IndexMap, IndexSet};
use std::collections::HashMap;
use std::fmt;

/// How a name got bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    /// Assignment, loop/with target, deletion or walrus.
    Assign,
    Function,
    Class,
    Import,
    Param,
    /// Exception handler name or pattern capture.
    Capture,
}

/// Names bound by one scope.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    pub names: IndexMap<String, BindingKind>,
    pub globals: IndexSet<String>,
    pub nonlocals: IndexSet<String>,
}

impl Bindings {
    /// Bindings of a module body.
    pub fn of_module(module: &Module) -> Self {
        Self::of_body(&module.body)
    }

    /// Bindings of a statement list, not descending into nested scopes.
    pub fn of_body(body: &[Stmt]) -> Self {
        let mut out = Self::default();
        BindingCollector::new(&mut out).visit_body(body);
        out
    }

    pub fn of_function(f: &FunctionDef) -> Self {
        let mut out = Self::default();
        for a in f.args.all() {
            out.bind(&a.arg, BindingKind::Param);
        }
        BindingCollector::new(&mut out).visit_body(&f.body);
        out
    }

    pub fn of_class(c: &ClassDef) -> Self {
        Self::of_body(&c.body)
    }

    pub fn of_lambda(args: &Arguments, body: &Expr) -> Self {
        let mut out = Self::default();
        for a in args.all() {
            out.bind(&a.arg, BindingKind::Param);
        }
        BindingCollector::new(&mut out).visit_expr(body);
        out
    }

    /// Iteration targets of a comprehension. Walrus targets inside it bind
    /// in the enclosing scope instead.
    pub fn of_comprehension(generators: &[Comprehension]) -> Self {
        let mut out = Self::default();
        for g in generators {
            collect_targets(&g.target, &mut out);
        }
        out
    }

    fn bind(&mut self, name: &str, kind: BindingKind) {
        if !self.names.contains_key(name) {
            self.names.insert(name.to_owned(), kind);
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    pub fn kind(&self, name: &str) -> Option<BindingKind> {
        self.names.get(name).copied()
    }

    /// Bound here and not redirected by `global`/`nonlocal`.
    pub fn is_local(&self, name: &str) -> bool {
        self.contains(name) && !self.globals.contains(name) && !self.nonlocals.contains(name)
    }
}

fn collect_targets(target: &Expr, out: &mut Bindings) {
    match target {
        Expr::Name { id, .. } => out.bind(id, BindingKind::Assign),
        Expr::Tuple { elts, .. } | Expr::List { elts, .. } => {
            for e in elts {
                collect_targets(e, out);
            }
        }
        Expr::Starred { value, .. } => collect_targets(value, out),
        _ => {}
    }
}

struct BindingCollector<'a> {
    out: &'a mut Bindings,
    /// Inside a comprehension only walrus targets reach this scope.
    walrus_only: bool,
}

impl<'a> BindingCollector<'a> {
    fn new(out: &'a mut Bindings) -> Self {
        Self {
            out,
            walrus_only: false,
        }
    }

    /// Parts of a signature evaluated in the defining scope.
    fn outer_arguments(&mut self, args: &Arguments) {
        for a in args.all() {
            self.visit_opt(a.annotation.as_deref());
        }
        self.visit_exprs(&args.defaults);
        for d in args.kw_defaults.iter().flatten() {
            self.visit_expr(d);
        }
    }

    fn comprehension(&mut self, generators: &[Comprehension], elts: &[&Expr]) {
        let mut first = true;
        for g in generators {
            if first {
                self.visit_expr(&g.iter);
            }
            let saved = std::mem::replace(&mut self.walrus_only, true);
            self.visit_expr(&g.target);
            if !first {
                self.visit_expr(&g.iter);
            }
            self.visit_exprs(&g.ifs);
            self.walrus_only = saved;
            first = false;
        }
        let saved = std::mem::replace(&mut self.walrus_only, true);
        for e in elts {
            self.visit_expr(e);
        }
        self.walrus_only = saved;
    }
}

impl Visitor for BindingCollector<'_> {
    fn visit_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::FunctionDef(f) | Stmt::AsyncFunctionDef(f) => {
                self.out.bind(&f.name, BindingKind::Function);
                self.visit_exprs(&f.decorator_list);
                self.outer_arguments(&f.args);
                self.visit_opt(f.returns.as_deref());
            }
            Stmt::ClassDef(c) => {
                self.out.bind(&c.name, BindingKind::Class);
                self.visit_exprs(&c.decorator_list);
                self.visit_exprs(&c.bases);
                for k in &c.keywords {
                    self.visit_keyword(k);
                }
            }
            Stmt::Global { names } => self.out.globals.extend(names.iter().cloned()),
            Stmt::Nonlocal { names } => self.out.nonlocals.extend(names.iter().cloned()),
            Stmt::Import { names } | Stmt::ImportFrom { names, .. } => {
                for a in names.iter().filter(|a| a.name != "*") {
                    self.out.bind(a.bound_name(), BindingKind::Import);
                }
            }
            _ => visit::walk_stmt(self, stmt),
        }
    }

    fn visit_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Name {
                id,
                ctx: ExprContext::Store | ExprContext::Del,
            } if !self.walrus_only => self.out.bind(id, BindingKind::Assign),
            Expr::NamedExpr { target, value } => {
                if let Expr::Name { id, .. } = target.as_ref() {
                    self.out.bind(id, BindingKind::Assign);
                }
                self.visit_expr(value);
            }
            Expr::Lambda { args, .. } => {
                self.visit_exprs(&args.defaults);
                for d in args.kw_defaults.iter().flatten() {
                    self.visit_expr(d);
                }
            }
            Expr::ListComp { elt, generators }
            | Expr::SetComp { elt, generators }
            | Expr::GeneratorExp { elt, generators } => self.comprehension(generators, &[elt]),
            Expr::DictComp {
                key,
                value,
                generators,
            } => self.comprehension(generators, &[key, value]),
            _ => visit::walk_expr(self, expr),
        }
    }

    fn visit_pattern(&mut self, pattern: &Pattern) {
        match pattern {
            Pattern::MatchAs { name: Some(n), .. }
            | Pattern::MatchStar { name: Some(n) }
            | Pattern::MatchMapping { rest: Some(n), .. } => {
                self.out.bind(n, BindingKind::Capture)
            }
            _ => {}
        }
        visit::walk_pattern(self, pattern);
    }

    fn visit_handler(&mut self, handler: &ExceptHandler) {
        if let Some(n) = &handler.name {
            self.out.bind(n, BindingKind::Capture);
        }
        visit::walk_handler(self, handler);
    }
}

/// Stable identifier of a function scope: the dotted path of enclosing
/// definitions, with `#k` for the k-th redefinition of a name at one level.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(String);

impl ScopeId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Assigns [`ScopeId`]s during a walk. Call [`ScopeNamer::enter`] for every
/// `def` and `class` in source order and [`ScopeNamer::exit`] after its body.
#[derive(Debug)]
pub struct ScopeNamer {
    stack: Vec<(String, HashMap<String, usize>)>,
}

impl Default for ScopeNamer {
    fn default() -> Self {
        Self {
            stack: vec![(String::new(), HashMap::new())],
        }
    }
}

impl ScopeNamer {
    pub fn enter(&mut self, name: &str) -> ScopeId {
        let level = self.stack.len() - 1;
        let (prefix, seen) = &mut self.stack[level];
        let count = seen.entry(name.to_owned()).or_insert(0);
        let base = if prefix.is_empty() {
            name.to_owned()
        } else {
            format!("{prefix}.{name}")
        };
        let id = match *count {
            0 => base,
            k => format!("{base}#{k}"),
        };
        *count += 1;
        self.stack.push((id.clone(), HashMap::new()));
        ScopeId(id)
    }

    pub fn exit(&mut self) {
        if self.stack.len() > 1 {
            self.stack.pop();
        }
    }
}

#[derive(Debug)]
pub enum Frame {
    Module(Bindings),
    Class(Bindings),
    Function { id: ScopeId, bindings: Bindings },
    Lambda(Bindings),
    Comprehension(Bindings),
}

/// Where a name reference lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution<'a> {
    Module,
    /// A class-body binding of the innermost frame.
    Class,
    Local(&'a ScopeId),
    /// Bound by a lambda parameter or comprehension target.
    Shadowed,
}

/// Frames from the module (bottom) to the innermost scope (top).
#[derive(Debug)]
pub struct ScopeStack {
    frames: Vec<Frame>,
}

impl ScopeStack {
    pub fn new(module: &Module) -> Self {
        Self {
            frames: vec![Frame::Module(Bindings::of_module(module))],
        }
    }

    pub fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    pub fn pop(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn innermost(&self) -> &Frame {
        &self.frames[self.frames.len() - 1]
    }

    /// Nearest enclosing function scope, if any.
    pub fn function(&self) -> Option<&ScopeId> {
        self.frames.iter().rev().find_map(|f| match f {
            Frame::Function { id, .. } => Some(id),
            _ => None,
        })
    }

    pub fn in_class_body(&self) -> bool {
        matches!(self.innermost(), Frame::Class(_))
    }

    pub fn resolve(&self, name: &str) -> Resolution<'_> {
        self.resolve_from(name, false)
    }

    /// Resolution of a walrus target, which binds outside comprehensions.
    pub fn resolve_walrus(&self, name: &str) -> Resolution<'_> {
        self.resolve_from(name, true)
    }

    fn resolve_from(&self, name: &str, skip_comprehensions: bool) -> Resolution<'_> {
        let top = self.frames.len() - 1;
        for (depth, frame) in self.frames.iter().enumerate().rev() {
            match frame {
                Frame::Comprehension(_) if skip_comprehensions => {}
                Frame::Lambda(b) | Frame::Comprehension(b) => {
                    if b.contains(name) {
                        return Resolution::Shadowed;
                    }
                }
                Frame::Class(b) if depth == top => {
                    if b.globals.contains(name) {
                        return Resolution::Module;
                    }
                    if b.is_local(name) {
                        return Resolution::Class;
                    }
                }
                Frame::Class(_) => {}
                Frame::Function { id, bindings } => {
                    if bindings.globals.contains(name) {
                        return Resolution::Module;
                    }
                    if bindings.is_local(name) {
                        return Resolution::Local(id);
                    }
                }
                Frame::Module(_) => return Resolution::Module,
            }
        }
        Resolution::Module
    }
}
