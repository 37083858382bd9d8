//! Moves literals and call targets into one module-level table.
//!
//! `print("hi")` becomes `eval(T[0])(T[1])` with `T = ['print', 'hi']`, and
//! `"-".join(xs)` becomes `T[0](T[1], xs)` with `T = [str.join, '-']`.
use crate::{PassContext, Transform};
use pyveil_core::ast::*;
use pyveil_core::build;
use pyveil_core::fold::{self, Rewriter};
use pyveil_core::scope::{Bindings, Frame, Resolution, ScopeNamer, ScopeStack};
use pyveil_utils::errors::TransformError;
use tracing::debug;

/// Interns constants and call targets into `table_name`.
#[derive(Debug, Clone)]
pub struct Collector {
    /// Move literals into the table, not only call targets.
    pub collect_consts: bool,
    pub table_name: String,
}

impl Default for Collector {
    fn default() -> Self {
        Self {
            collect_consts: true,
            table_name: "_pyveil_tbl".into(),
        }
    }
}

/// One table slot.
#[derive(Debug, Clone, PartialEq)]
pub enum TableEntry {
    Const(Constant),
    /// `owner.attr`, e.g. `str.join`.
    Resolved { owner: String, attr: String },
    /// A slot an earlier pass rewrote. Kept in place, never shared.
    Opaque(Expr),
}

impl TableEntry {
    /// Entry identity. Unlike `==`, floats compare by bit pattern so `0.0`
    /// and `-0.0` keep separate slots and a NaN finds its own.
    fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Const(Constant::Float(a)), Self::Const(Constant::Float(b))) => {
                a.to_bits() == b.to_bits()
            }
            (
                Self::Const(Constant::Complex { real: ar, imag: ai }),
                Self::Const(Constant::Complex { real: br, imag: bi }),
            ) => ar.to_bits() == br.to_bits() && ai.to_bits() == bi.to_bits(),
            (Self::Opaque(_), _) | (_, Self::Opaque(_)) => false,
            _ => self == other,
        }
    }

    fn to_expr(&self) -> Expr {
        match self {
            Self::Const(c) => Expr::constant(c.clone()),
            Self::Resolved { owner, attr } => Expr::attr(Expr::name(owner.as_str()), attr.as_str()),
            Self::Opaque(e) => e.clone(),
        }
    }

    fn from_expr(expr: Expr) -> Self {
        match expr {
            Expr::Constant { value, .. } => Self::Const(value),
            Expr::Attribute { value, attr, ctx } => match *value {
                Expr::Name { id, .. } => Self::Resolved { owner: id, attr },
                value => Self::Opaque(Expr::Attribute {
                    value: Box::new(value),
                    attr,
                    ctx,
                }),
            },
            other => Self::Opaque(other),
        }
    }
}

/// Literal receiver types whose methods can be looked up on the type.
const RECEIVER_TYPES: [&str; 6] = ["str", "bytes", "int", "float", "complex", "bool"];

struct Collect<'a> {
    table: &'a str,
    collect_consts: bool,
    entries: Vec<TableEntry>,
    scopes: ScopeStack,
    namer: ScopeNamer,
}

impl Collect<'_> {
    fn intern(&mut self, entry: TableEntry) -> usize {
        if let Some(i) = self.entries.iter().position(|e| e.same(&entry)) {
            return i;
        }
        self.entries.push(entry);
        self.entries.len() - 1
    }

    fn lookup(&mut self, entry: TableEntry) -> Expr {
        let idx = self.intern(entry);
        Expr::subscript(Expr::name(self.table), build::int_lit(idx as i64))
    }

    fn is_lookup(&self, expr: &Expr) -> bool {
        matches!(
            expr,
            Expr::Subscript { value, .. }
                if matches!(value.as_ref(), Expr::Name { id, .. } if id == self.table)
        )
    }

    /// `eval(T[i])`, as emitted for bare-name calls.
    fn is_indirect(&self, expr: &Expr) -> bool {
        match expr {
            Expr::Call { func, args, .. } => {
                matches!(func.as_ref(), Expr::Name { id, .. } if id == "eval")
                    && matches!(args.as_slice(), [arg] if self.is_lookup(arg))
            }
            _ => false,
        }
    }

    fn constant(&mut self, value: Constant) -> Expr {
        if self.collect_consts {
            self.lookup(TableEntry::Const(value))
        } else {
            Expr::constant(value)
        }
    }

    /// Whether `eval` evaluated in the module namespace finds the same
    /// object `name` refers to here.
    fn evaluable(&self, name: &str) -> bool {
        name != "super"
            && !matches!(
                self.scopes.resolve(name),
                Resolution::Local(_) | Resolution::Shadowed
            )
    }

    fn call(&mut self, func: Expr, args: Vec<Expr>, keywords: Vec<Keyword>) -> Expr {
        let (func, receiver) = match func {
            Expr::Name { id, .. } if self.evaluable(&id) => {
                let target = self.lookup(TableEntry::Const(Constant::str(id)));
                (Expr::call(Expr::name("eval"), vec![target]), None)
            }
            Expr::Name { id, ctx } => (Expr::Name { id, ctx }, None),
            Expr::Attribute { value, attr, ctx } => match *value {
                Expr::Constant { value: receiver, .. }
                    if RECEIVER_TYPES.contains(&receiver.type_name()) =>
                {
                    let owner = receiver.type_name().to_owned();
                    let func = self.lookup(TableEntry::Resolved { owner, attr });
                    (func, Some(self.constant(receiver)))
                }
                value => (
                    self.rewrite_expr(Expr::Attribute {
                        value: Box::new(value),
                        attr,
                        ctx,
                    }),
                    None,
                ),
            },
            other => (self.rewrite_expr(other), None),
        };
        let mut all: Vec<Expr> = receiver.into_iter().collect();
        all.extend(self.rewrite_exprs(args));
        Expr::Call {
            func: Box::new(func),
            args: all,
            keywords: keywords
                .into_iter()
                .map(|k| self.rewrite_keyword(k))
                .collect(),
        }
    }

    fn function(&mut self, f: FunctionDef) -> FunctionDef {
        let bindings = Bindings::of_function(&f);
        let decorator_list = self.rewrite_exprs(f.decorator_list);
        let args = Box::new(self.rewrite_arguments(*f.args));
        let returns = self.rewrite_opt(f.returns);

        let id = self.namer.enter(&f.name);
        self.scopes.push(Frame::Function { id, bindings });
        let body = self.rewrite_body(f.body);
        self.scopes.pop();
        self.namer.exit();

        FunctionDef {
            name: f.name,
            args,
            body,
            decorator_list,
            returns,
            type_comment: f.type_comment,
        }
    }

    fn class(&mut self, c: ClassDef) -> ClassDef {
        let members = Bindings::of_class(&c);
        let decorator_list = self.rewrite_exprs(c.decorator_list);
        let bases = self.rewrite_exprs(c.bases);
        let keywords = c
            .keywords
            .into_iter()
            .map(|k| self.rewrite_keyword(k))
            .collect();

        self.namer.enter(&c.name);
        self.scopes.push(Frame::Class(members));
        let body = self.rewrite_body(c.body);
        self.scopes.pop();
        self.namer.exit();

        ClassDef {
            name: c.name,
            bases,
            keywords,
            body,
            decorator_list,
        }
    }

    fn comprehension<T>(
        &mut self,
        generators: Vec<Comprehension>,
        inner: impl FnOnce(&mut Self) -> T,
    ) -> (Vec<Comprehension>, T) {
        let bindings = Bindings::of_comprehension(&generators);
        let mut rest = generators.into_iter();
        let first = rest.next().map(|g| Comprehension {
            iter: self.rewrite_expr(g.iter),
            ..g
        });

        self.scopes.push(Frame::Comprehension(bindings));
        let mut out = Vec::new();
        if let Some(g) = first {
            out.push(Comprehension {
                target: self.rewrite_expr(g.target),
                ifs: self.rewrite_exprs(g.ifs),
                ..g
            });
        }
        for g in rest {
            out.push(self.rewrite_comprehension(g));
        }
        let value = inner(self);
        self.scopes.pop();
        (out, value)
    }
}

impl Rewriter for Collect<'_> {
    fn rewrite_stmt(&mut self, stmt: Stmt) -> Stmt {
        match stmt {
            Stmt::FunctionDef(f) => Stmt::FunctionDef(self.function(f)),
            Stmt::AsyncFunctionDef(f) => Stmt::AsyncFunctionDef(self.function(f)),
            Stmt::ClassDef(c) => Stmt::ClassDef(self.class(c)),
            other => fold::walk_stmt(self, other),
        }
    }

    fn rewrite_expr(&mut self, expr: Expr) -> Expr {
        match expr {
            e if self.is_lookup(&e) || self.is_indirect(&e) => e,
            Expr::Constant { value, kind } if !self.collect_consts => {
                Expr::Constant { value, kind }
            }
            Expr::Constant { value, .. } => self.constant(value),
            Expr::JoinedStr { values } => Expr::JoinedStr {
                values: values
                    .into_iter()
                    .map(|v| match v {
                        Expr::Constant { value, .. } if self.collect_consts => {
                            build::formatted(self.constant(value))
                        }
                        other => self.rewrite_expr(other),
                    })
                    .collect(),
            },
            Expr::Call {
                func,
                args,
                keywords,
            } => self.call(*func, args, keywords),
            Expr::Lambda { args, body } => {
                let bindings = Bindings::of_lambda(&args, &body);
                let args = Box::new(self.rewrite_arguments(*args));
                self.scopes.push(Frame::Lambda(bindings));
                let body = self.rewrite_boxed(body);
                self.scopes.pop();
                Expr::Lambda { args, body }
            }
            Expr::ListComp { elt, generators } => {
                let (generators, elt) = self.comprehension(generators, |r| r.rewrite_boxed(elt));
                Expr::ListComp { elt, generators }
            }
            Expr::SetComp { elt, generators } => {
                let (generators, elt) = self.comprehension(generators, |r| r.rewrite_boxed(elt));
                Expr::SetComp { elt, generators }
            }
            Expr::GeneratorExp { elt, generators } => {
                let (generators, elt) = self.comprehension(generators, |r| r.rewrite_boxed(elt));
                Expr::GeneratorExp { elt, generators }
            }
            Expr::DictComp {
                key,
                value,
                generators,
            } => {
                let (generators, (key, value)) = self.comprehension(generators, |r| {
                    (r.rewrite_boxed(key), r.rewrite_boxed(value))
                });
                Expr::DictComp {
                    key,
                    value,
                    generators,
                }
            }
            other => fold::walk_expr(self, other),
        }
    }

    // patterns only accept literals
    fn rewrite_pattern(&mut self, pattern: Pattern) -> Pattern {
        pattern
    }
}

/// Removes a table left by an earlier run and returns its entries, one per
/// slot so existing lookups keep their index.
fn take_table(body: &mut Vec<Stmt>, table: &str) -> Vec<TableEntry> {
    let found = body.iter().position(|s| match s {
        Stmt::Assign { targets, value, .. } => {
            matches!(targets.as_slice(), [Expr::Name { id, .. }] if id == table)
                && matches!(value.as_ref(), Expr::List { .. })
        }
        _ => false,
    });
    let Some(i) = found else {
        return Vec::new();
    };
    match body.remove(i) {
        Stmt::Assign { value, .. } => match *value {
            Expr::List { elts, .. } => elts.into_iter().map(TableEntry::from_expr).collect(),
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

impl Transform for Collector {
    fn name(&self) -> &'static str {
        "collector"
    }

    fn apply(&self, mut module: Module, ctx: &mut PassContext<'_>) -> Result<Module, TransformError> {
        let entries = take_table(&mut module.body, &self.table_name);
        let seeded = entries.len();
        let mut collect = Collect {
            table: &self.table_name,
            collect_consts: self.collect_consts,
            entries,
            scopes: ScopeStack::new(&module),
            namer: ScopeNamer::default(),
        };
        let mut module = collect.rewrite_module(module);

        if collect.entries.is_empty() {
            return Ok(module);
        }
        let table = Stmt::Assign {
            targets: vec![Expr::store(self.table_name.as_str())],
            value: Box::new(build::list(
                collect.entries.iter().map(TableEntry::to_expr).collect(),
            )),
            type_comment: None,
        };
        let at = module
            .body
            .iter()
            .position(|s| !s.is_future_import())
            .unwrap_or(module.body.len());
        module.body.insert(at, table);

        debug!(
            path = %ctx.path.display(),
            entries = collect.entries.len(),
            seeded,
            "collected table"
        );
        Ok(module)
    }
}
