//! Read-only traversal with the same field order as [`crate::fold`].
use crate::ast::*;

pub trait Visitor {
    fn visit_module(&mut self, module: &Module) {
        self.visit_body(&module.body);
    }

    fn visit_body(&mut self, body: &[Stmt]) {
        for s in body {
            self.visit_stmt(s);
        }
    }

    fn visit_stmt(&mut self, stmt: &Stmt) {
        walk_stmt(self, stmt);
    }

    fn visit_expr(&mut self, expr: &Expr) {
        walk_expr(self, expr);
    }

    fn visit_pattern(&mut self, pattern: &Pattern) {
        walk_pattern(self, pattern);
    }

    fn visit_arguments(&mut self, args: &Arguments) {
        walk_arguments(self, args);
    }

    fn visit_arg(&mut self, arg: &Arg) {
        if let Some(a) = &arg.annotation {
            self.visit_expr(a);
        }
    }

    fn visit_keyword(&mut self, keyword: &Keyword) {
        self.visit_expr(&keyword.value);
    }

    fn visit_alias(&mut self, _alias: &Alias) {}

    fn visit_comprehension(&mut self, comp: &Comprehension) {
        self.visit_expr(&comp.target);
        self.visit_expr(&comp.iter);
        self.visit_exprs(&comp.ifs);
    }

    fn visit_handler(&mut self, handler: &ExceptHandler) {
        walk_handler(self, handler);
    }

    fn visit_with_item(&mut self, item: &WithItem) {
        self.visit_expr(&item.context_expr);
        self.visit_opt(item.optional_vars.as_deref());
    }

    fn visit_match_case(&mut self, case: &MatchCase) {
        self.visit_pattern(&case.pattern);
        self.visit_opt(case.guard.as_deref());
        self.visit_body(&case.body);
    }

    fn visit_opt(&mut self, expr: Option<&Expr>) {
        if let Some(e) = expr {
            self.visit_expr(e);
        }
    }

    fn visit_exprs(&mut self, exprs: &[Expr]) {
        for e in exprs {
            self.visit_expr(e);
        }
    }
}

pub fn walk_function<V: Visitor + ?Sized>(v: &mut V, f: &FunctionDef) {
    v.visit_exprs(&f.decorator_list);
    v.visit_arguments(&f.args);
    v.visit_opt(f.returns.as_deref());
    v.visit_body(&f.body);
}

pub fn walk_class<V: Visitor + ?Sized>(v: &mut V, c: &ClassDef) {
    v.visit_exprs(&c.decorator_list);
    v.visit_exprs(&c.bases);
    for k in &c.keywords {
        v.visit_keyword(k);
    }
    v.visit_body(&c.body);
}

pub fn walk_stmt<V: Visitor + ?Sized>(v: &mut V, stmt: &Stmt) {
    match stmt {
        Stmt::FunctionDef(f) | Stmt::AsyncFunctionDef(f) => walk_function(v, f),
        Stmt::ClassDef(c) => walk_class(v, c),
        Stmt::Return { value } => v.visit_opt(value.as_deref()),
        Stmt::Delete { targets } => v.visit_exprs(targets),
        Stmt::Assign { targets, value, .. } => {
            v.visit_exprs(targets);
            v.visit_expr(value);
        }
        Stmt::AugAssign { target, value, .. } => {
            v.visit_expr(target);
            v.visit_expr(value);
        }
        Stmt::AnnAssign {
            target,
            annotation,
            value,
            ..
        } => {
            v.visit_expr(target);
            v.visit_expr(annotation);
            v.visit_opt(value.as_deref());
        }
        Stmt::For(f) | Stmt::AsyncFor(f) => {
            v.visit_expr(&f.target);
            v.visit_expr(&f.iter);
            v.visit_body(&f.body);
            v.visit_body(&f.orelse);
        }
        Stmt::While { test, body, orelse } | Stmt::If { test, body, orelse } => {
            v.visit_expr(test);
            v.visit_body(body);
            v.visit_body(orelse);
        }
        Stmt::With(w) | Stmt::AsyncWith(w) => {
            for item in &w.items {
                v.visit_with_item(item);
            }
            v.visit_body(&w.body);
        }
        Stmt::Match { subject, cases } => {
            v.visit_expr(subject);
            for c in cases {
                v.visit_match_case(c);
            }
        }
        Stmt::Raise { exc, cause } => {
            v.visit_opt(exc.as_deref());
            v.visit_opt(cause.as_deref());
        }
        Stmt::Try(t) | Stmt::TryStar(t) => {
            v.visit_body(&t.body);
            for h in &t.handlers {
                v.visit_handler(h);
            }
            v.visit_body(&t.orelse);
            v.visit_body(&t.finalbody);
        }
        Stmt::Assert { test, msg } => {
            v.visit_expr(test);
            v.visit_opt(msg.as_deref());
        }
        Stmt::Import { names } | Stmt::ImportFrom { names, .. } => {
            for a in names {
                v.visit_alias(a);
            }
        }
        Stmt::Expr { value } => v.visit_expr(value),
        Stmt::Global { .. } | Stmt::Nonlocal { .. } | Stmt::Pass | Stmt::Break | Stmt::Continue => {}
    }
}

pub fn walk_expr<V: Visitor + ?Sized>(v: &mut V, expr: &Expr) {
    match expr {
        Expr::BoolOp { values, .. } => v.visit_exprs(values),
        Expr::NamedExpr { target, value } => {
            v.visit_expr(target);
            v.visit_expr(value);
        }
        Expr::BinOp { left, right, .. } => {
            v.visit_expr(left);
            v.visit_expr(right);
        }
        Expr::UnaryOp { operand, .. } => v.visit_expr(operand),
        Expr::Lambda { args, body } => {
            v.visit_arguments(args);
            v.visit_expr(body);
        }
        Expr::IfExp { test, body, orelse } => {
            v.visit_expr(test);
            v.visit_expr(body);
            v.visit_expr(orelse);
        }
        Expr::Dict { keys, values } => {
            for k in keys.iter().flatten() {
                v.visit_expr(k);
            }
            v.visit_exprs(values);
        }
        Expr::Set { elts } => v.visit_exprs(elts),
        Expr::ListComp { elt, generators }
        | Expr::SetComp { elt, generators }
        | Expr::GeneratorExp { elt, generators } => {
            v.visit_expr(elt);
            for g in generators {
                v.visit_comprehension(g);
            }
        }
        Expr::DictComp {
            key,
            value,
            generators,
        } => {
            v.visit_expr(key);
            v.visit_expr(value);
            for g in generators {
                v.visit_comprehension(g);
            }
        }
        Expr::Await { value } | Expr::YieldFrom { value } => v.visit_expr(value),
        Expr::Yield { value } => v.visit_opt(value.as_deref()),
        Expr::Compare {
            left, comparators, ..
        } => {
            v.visit_expr(left);
            v.visit_exprs(comparators);
        }
        Expr::Call {
            func,
            args,
            keywords,
        } => {
            v.visit_expr(func);
            v.visit_exprs(args);
            for k in keywords {
                v.visit_keyword(k);
            }
        }
        Expr::FormattedValue {
            value, format_spec, ..
        } => {
            v.visit_expr(value);
            v.visit_opt(format_spec.as_deref());
        }
        Expr::JoinedStr { values } => v.visit_exprs(values),
        Expr::Attribute { value, .. } | Expr::Starred { value, .. } => v.visit_expr(value),
        Expr::Subscript { value, slice, .. } => {
            v.visit_expr(value);
            v.visit_expr(slice);
        }
        Expr::List { elts, .. } | Expr::Tuple { elts, .. } => v.visit_exprs(elts),
        Expr::Slice { lower, upper, step } => {
            v.visit_opt(lower.as_deref());
            v.visit_opt(upper.as_deref());
            v.visit_opt(step.as_deref());
        }
        Expr::Constant { .. } | Expr::Name { .. } => {}
    }
}

pub fn walk_pattern<V: Visitor + ?Sized>(v: &mut V, pattern: &Pattern) {
    match pattern {
        Pattern::MatchValue { value } => v.visit_expr(value),
        Pattern::MatchSequence { patterns } | Pattern::MatchOr { patterns } => {
            for p in patterns {
                v.visit_pattern(p);
            }
        }
        Pattern::MatchMapping { keys, patterns, .. } => {
            v.visit_exprs(keys);
            for p in patterns {
                v.visit_pattern(p);
            }
        }
        Pattern::MatchClass {
            cls,
            patterns,
            kwd_patterns,
            ..
        } => {
            v.visit_expr(cls);
            for p in patterns.iter().chain(kwd_patterns) {
                v.visit_pattern(p);
            }
        }
        Pattern::MatchAs { pattern, .. } => {
            if let Some(p) = pattern {
                v.visit_pattern(p);
            }
        }
        Pattern::MatchSingleton { .. } | Pattern::MatchStar { .. } => {}
    }
}

pub fn walk_arguments<V: Visitor + ?Sized>(v: &mut V, a: &Arguments) {
    for arg in a.all() {
        v.visit_arg(arg);
    }
    for d in a.kw_defaults.iter().flatten() {
        v.visit_expr(d);
    }
    v.visit_exprs(&a.defaults);
}

/// Collects every identifier spelled anywhere in a tree: names, attributes,
/// parameters, definitions, import aliases and pattern captures.
#[derive(Debug, Default)]
pub struct IdentifierCollector {
    pub names: std::collections::HashSet<String>,
}

impl IdentifierCollector {
    pub fn collect(module: &Module) -> std::collections::HashSet<String> {
        let mut c = Self::default();
        c.visit_module(module);
        c.names
    }

    fn add(&mut self, s: &str) {
        self.names.insert(s.to_owned());
    }
}

impl Visitor for IdentifierCollector {
    fn visit_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::FunctionDef(f) | Stmt::AsyncFunctionDef(f) => self.add(&f.name),
            Stmt::ClassDef(c) => self.add(&c.name),
            Stmt::Global { names } | Stmt::Nonlocal { names } => {
                for n in names {
                    self.add(n);
                }
            }
            Stmt::ImportFrom {
                module: Some(m), ..
            } => {
                for part in m.split('.') {
                    self.add(part);
                }
            }
            _ => {}
        }
        walk_stmt(self, stmt);
    }

    fn visit_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Name { id, .. } => self.add(id),
            Expr::Attribute { attr, .. } => self.add(attr),
            _ => {}
        }
        walk_expr(self, expr);
    }

    fn visit_pattern(&mut self, pattern: &Pattern) {
        match pattern {
            Pattern::MatchAs { name: Some(n), .. }
            | Pattern::MatchStar { name: Some(n) }
            | Pattern::MatchMapping { rest: Some(n), .. } => self.add(n),
            Pattern::MatchClass { kwd_attrs, .. } => {
                for a in kwd_attrs {
                    self.add(a);
                }
            }
            _ => {}
        }
        walk_pattern(self, pattern);
    }

    fn visit_arg(&mut self, arg: &Arg) {
        self.add(&arg.arg);
        if let Some(a) = &arg.annotation {
            self.visit_expr(a);
        }
    }

    fn visit_keyword(&mut self, keyword: &Keyword) {
        if let Some(k) = &keyword.arg {
            self.add(k);
        }
        self.visit_expr(&keyword.value);
    }

    fn visit_alias(&mut self, alias: &Alias) {
        for part in alias.name.split('.') {
            self.add(part);
        }
        if let Some(a) = &alias.asname {
            self.add(a);
        }
    }

    fn visit_handler(&mut self, handler: &ExceptHandler) {
        if let Some(n) = &handler.name {
            self.add(n);
        }
        walk_handler(self, handler);
    }
}

pub fn walk_handler<V: Visitor + ?Sized>(v: &mut V, handler: &ExceptHandler) {
    v.visit_opt(handler.type_.as_deref());
    v.visit_body(&handler.body);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_all_spellings() {
        let module = Module::new(vec![
            Stmt::ImportFrom {
                module: Some("pkg.util".into()),
                names: vec![Alias {
                    name: "helper".into(),
                    asname: Some("h".into()),
                }],
                level: 0,
            },
            Stmt::expr(Expr::call(
                Expr::attr(Expr::name("obj"), "method"),
                vec![],
            )),
        ]);
        let ids = IdentifierCollector::collect(&module);
        for expected in ["pkg", "util", "helper", "h", "obj", "method"] {
            assert!(ids.contains(expected), "missing {expected}");
        }
    }
}
