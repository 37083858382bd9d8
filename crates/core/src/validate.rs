//! Structural well-formedness checks run after every pass.
//!
//! The type system already guarantees that required children exist; this
//! catches the invariants it cannot express (arity pairs, non-empty bodies,
//! assignable targets, f-string shape, identifier spelling).
use crate::ast::*;
use crate::names::is_keyword;
use crate::visit::{self, Visitor};
use pyveil_utils::errors::TransformError;

/// Checks a whole module, failing on the first violation.
pub fn check_module(module: &Module) -> Result<(), TransformError> {
    let mut v = Validator::default();
    v.visit_module(module);
    match v.error {
        Some(e) => Err(TransformError::Malformed(e)),
        None => Ok(()),
    }
}

#[derive(Debug, Default)]
struct Validator {
    error: Option<String>,
    in_joined: bool,
}

impl Validator {
    fn fail(&mut self, msg: impl Into<String>) {
        if self.error.is_none() {
            self.error = Some(msg.into());
        }
    }

    fn ident(&mut self, what: &str, s: &str) {
        let mut chars = s.chars();
        let spelled = matches!(chars.next(), Some(c) if c == '_' || c.is_alphabetic())
            && chars.all(|c| c == '_' || c.is_alphanumeric());
        if !spelled {
            self.fail(format!("{what} '{s}' is not an identifier"));
        } else if is_keyword(s) {
            self.fail(format!("{what} '{s}' is a keyword"));
        }
    }

    fn body(&mut self, what: &str, body: &[Stmt]) {
        if body.is_empty() {
            self.fail(format!("{what} has an empty body"));
        }
    }

    fn target(&mut self, e: &Expr) {
        match e {
            Expr::Name { ctx, .. } | Expr::Attribute { ctx, .. } | Expr::Subscript { ctx, .. } => {
                if *ctx != ExprContext::Store {
                    self.fail("assignment target without Store context");
                }
            }
            Expr::Tuple { elts, ctx } | Expr::List { elts, ctx } => {
                if *ctx != ExprContext::Store {
                    self.fail("assignment target without Store context");
                }
                for el in elts {
                    self.target(el);
                }
            }
            Expr::Starred { value, .. } => self.target(value),
            other => self.fail(format!("cannot assign to {}", kind(other))),
        }
    }
}

fn kind(e: &Expr) -> &'static str {
    match e {
        Expr::Call { .. } => "call",
        Expr::Constant { .. } => "literal",
        Expr::BinOp { .. } | Expr::UnaryOp { .. } | Expr::BoolOp { .. } => "operator",
        _ => "expression",
    }
}

impl Visitor for Validator {
    fn visit_stmt(&mut self, stmt: &Stmt) {
        if self.error.is_some() {
            return;
        }
        match stmt {
            Stmt::FunctionDef(f) | Stmt::AsyncFunctionDef(f) => {
                self.ident("function name", &f.name);
                self.body("function", &f.body);
            }
            Stmt::ClassDef(c) => {
                self.ident("class name", &c.name);
                self.body("class", &c.body);
            }
            Stmt::Assign { targets, .. } => {
                if targets.is_empty() {
                    self.fail("assignment without targets");
                }
                for t in targets {
                    self.target(t);
                }
            }
            Stmt::AugAssign { target, .. } | Stmt::AnnAssign { target, .. } => self.target(target),
            Stmt::For(f) | Stmt::AsyncFor(f) => {
                self.target(&f.target);
                self.body("for loop", &f.body);
            }
            Stmt::While { body, .. } => self.body("while loop", body),
            Stmt::If { body, .. } => self.body("if", body),
            Stmt::With(w) | Stmt::AsyncWith(w) => {
                if w.items.is_empty() {
                    self.fail("with statement without items");
                }
                for item in &w.items {
                    if let Some(t) = &item.optional_vars {
                        self.target(t);
                    }
                }
                self.body("with", &w.body);
            }
            Stmt::Match { cases, .. } => {
                if cases.is_empty() {
                    self.fail("match without cases");
                }
                for c in cases {
                    self.body("case", &c.body);
                }
            }
            Stmt::Try(t) | Stmt::TryStar(t) => {
                self.body("try", &t.body);
                if t.handlers.is_empty() && t.finalbody.is_empty() {
                    self.fail("try without handlers or finally");
                }
                if matches!(stmt, Stmt::TryStar(_)) && t.handlers.is_empty() {
                    self.fail("try/except* without handlers");
                }
                for h in &t.handlers {
                    self.body("except handler", &h.body);
                }
            }
            Stmt::Delete { targets } => {
                for t in targets {
                    if !matches!(
                        t,
                        Expr::Name { ctx: ExprContext::Del, .. }
                            | Expr::Attribute { ctx: ExprContext::Del, .. }
                            | Expr::Subscript { ctx: ExprContext::Del, .. }
                            | Expr::Tuple { ctx: ExprContext::Del, .. }
                            | Expr::List { ctx: ExprContext::Del, .. }
                    ) {
                        self.fail("delete target without Del context");
                    }
                }
            }
            Stmt::ImportFrom { module, level, .. } => {
                if module.is_none() && *level == 0 {
                    self.fail("absolute from-import without module");
                }
            }
            Stmt::Import { names } => {
                if names.is_empty() {
                    self.fail("import without names");
                }
            }
            Stmt::Global { names } | Stmt::Nonlocal { names } => {
                if names.is_empty() {
                    self.fail("global/nonlocal without names");
                }
                for n in names {
                    self.ident("declared name", n);
                }
            }
            _ => {}
        }
        visit::walk_stmt(self, stmt);
    }

    fn visit_expr(&mut self, expr: &Expr) {
        if self.error.is_some() {
            return;
        }
        let was_joined = self.in_joined;
        match expr {
            Expr::Name { id, .. } => self.ident("name", id),
            Expr::Attribute { attr, .. } => self.ident("attribute", attr),
            Expr::BoolOp { values, .. } if values.len() < 2 => {
                self.fail("boolean operation with fewer than two values");
            }
            Expr::Compare {
                ops, comparators, ..
            } if ops.is_empty() || ops.len() != comparators.len() => {
                self.fail("comparison operators and operands do not pair up");
            }
            Expr::Dict { keys, values } if keys.len() != values.len() => {
                self.fail("dict keys and values do not pair up");
            }
            Expr::NamedExpr { target, .. } if !matches!(**target, Expr::Name { .. }) => {
                self.fail("walrus target must be a name");
            }
            Expr::JoinedStr { values } => {
                for v in values {
                    match v {
                        Expr::FormattedValue { .. }
                        | Expr::Constant {
                            value: crate::constant::Constant::Str(_),
                            ..
                        } => {}
                        _ => self.fail("f-string part is neither text nor a slot"),
                    }
                }
                self.in_joined = true;
            }
            Expr::FormattedValue {
                conversion,
                format_spec,
                ..
            } => {
                if !was_joined {
                    self.fail("f-string slot outside an f-string");
                }
                if ![-1, 115, 114, 97].contains(conversion) {
                    self.fail(format!("bad f-string conversion {conversion}"));
                }
                if let Some(spec) = format_spec {
                    if !matches!(**spec, Expr::JoinedStr { .. }) {
                        self.fail("f-string format spec must be an f-string");
                    }
                }
                self.in_joined = false;
            }
            _ => self.in_joined = false,
        }
        visit::walk_expr(self, expr);
        self.in_joined = was_joined;
    }

    fn visit_pattern(&mut self, pattern: &Pattern) {
        match pattern {
            Pattern::MatchMapping { keys, patterns, .. } if keys.len() != patterns.len() => {
                self.fail("mapping pattern keys and patterns do not pair up");
            }
            Pattern::MatchClass {
                kwd_attrs,
                kwd_patterns,
                ..
            } if kwd_attrs.len() != kwd_patterns.len() => {
                self.fail("class pattern keywords do not pair up");
            }
            _ => {}
        }
        visit::walk_pattern(self, pattern);
    }

    fn visit_arguments(&mut self, args: &Arguments) {
        if args.defaults.len() > args.posonlyargs.len() + args.args.len() {
            self.fail("more defaults than positional parameters");
        }
        if args.kw_defaults.len() != args.kwonlyargs.len() {
            self.fail("keyword-only defaults do not pair up");
        }
        for a in args.all() {
            self.ident("parameter", &a.arg);
        }
        visit::walk_arguments(self, args);
    }

    fn visit_alias(&mut self, alias: &Alias) {
        if alias.name != "*" {
            for part in alias.name.split('.') {
                self.ident("imported name", part);
            }
        }
        if let Some(a) = &alias.asname {
            self.ident("import alias", a);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constant::Constant;

    #[test]
    fn accepts_simple_module() {
        let m = Module::new(vec![Stmt::assign("x", Expr::constant(Constant::int(1)))]);
        assert!(check_module(&m).is_ok());
    }

    #[test]
    fn rejects_loaded_target() {
        let m = Module::new(vec![Stmt::Assign {
            targets: vec![Expr::name("x")],
            value: Box::new(Expr::constant(Constant::int(1))),
            type_comment: None,
        }]);
        assert!(matches!(check_module(&m), Err(TransformError::Malformed(_))));
    }

    #[test]
    fn rejects_bare_slot_and_empty_body() {
        let slot = Stmt::expr(crate::build::formatted(Expr::name("x")));
        assert!(check_module(&Module::new(vec![slot])).is_err());

        let empty = crate::build::function("f", vec![]);
        assert!(check_module(&Module::new(vec![empty])).is_err());
    }

    #[test]
    fn rejects_keyword_names() {
        let m = Module::new(vec![Stmt::expr(Expr::name("class"))]);
        assert!(check_module(&m).is_err());
    }
}
