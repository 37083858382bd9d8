//! By-value tree rewriting.
//!
//! Every hook receives a node it owns and returns the node that takes its
//! place; the default implementation rebuilds the node from rewritten
//! children via the matching `walk_*` function. Passes override only the
//! hooks they care about and call back into `walk_*` to keep descending.
//! Children are visited in field order, the same order `visit` uses.
use crate::ast::*;

pub trait Rewriter {
    fn rewrite_module(&mut self, module: Module) -> Module {
        walk_module(self, module)
    }

    fn rewrite_body(&mut self, body: Vec<Stmt>) -> Vec<Stmt> {
        body.into_iter().map(|s| self.rewrite_stmt(s)).collect()
    }

    fn rewrite_stmt(&mut self, stmt: Stmt) -> Stmt {
        walk_stmt(self, stmt)
    }

    fn rewrite_expr(&mut self, expr: Expr) -> Expr {
        walk_expr(self, expr)
    }

    fn rewrite_pattern(&mut self, pattern: Pattern) -> Pattern {
        walk_pattern(self, pattern)
    }

    fn rewrite_arguments(&mut self, args: Arguments) -> Arguments {
        walk_arguments(self, args)
    }

    fn rewrite_arg(&mut self, arg: Arg) -> Arg {
        walk_arg(self, arg)
    }

    fn rewrite_keyword(&mut self, keyword: Keyword) -> Keyword {
        Keyword {
            arg: keyword.arg,
            value: self.rewrite_expr(keyword.value),
        }
    }

    fn rewrite_alias(&mut self, alias: Alias) -> Alias {
        alias
    }

    fn rewrite_comprehension(&mut self, comp: Comprehension) -> Comprehension {
        walk_comprehension(self, comp)
    }

    fn rewrite_handler(&mut self, handler: ExceptHandler) -> ExceptHandler {
        walk_handler(self, handler)
    }

    fn rewrite_with_item(&mut self, item: WithItem) -> WithItem {
        WithItem {
            context_expr: self.rewrite_expr(item.context_expr),
            optional_vars: self.rewrite_opt(item.optional_vars),
        }
    }

    fn rewrite_match_case(&mut self, case: MatchCase) -> MatchCase {
        MatchCase {
            pattern: self.rewrite_pattern(case.pattern),
            guard: self.rewrite_opt(case.guard),
            body: self.rewrite_body(case.body),
        }
    }

    fn rewrite_boxed(&mut self, expr: Box<Expr>) -> Box<Expr> {
        Box::new(self.rewrite_expr(*expr))
    }

    fn rewrite_opt(&mut self, expr: Option<Box<Expr>>) -> Option<Box<Expr>> {
        expr.map(|e| self.rewrite_boxed(e))
    }

    fn rewrite_exprs(&mut self, exprs: Vec<Expr>) -> Vec<Expr> {
        exprs.into_iter().map(|e| self.rewrite_expr(e)).collect()
    }
}

pub fn walk_module<R: Rewriter + ?Sized>(r: &mut R, module: Module) -> Module {
    Module {
        body: r.rewrite_body(module.body),
    }
}

pub fn walk_function<R: Rewriter + ?Sized>(r: &mut R, f: FunctionDef) -> FunctionDef {
    let decorator_list = r.rewrite_exprs(f.decorator_list);
    let args = Box::new(r.rewrite_arguments(*f.args));
    let returns = r.rewrite_opt(f.returns);
    FunctionDef {
        name: f.name,
        args,
        body: r.rewrite_body(f.body),
        decorator_list,
        returns,
        type_comment: f.type_comment,
    }
}

pub fn walk_class<R: Rewriter + ?Sized>(r: &mut R, c: ClassDef) -> ClassDef {
    let decorator_list = r.rewrite_exprs(c.decorator_list);
    let bases = r.rewrite_exprs(c.bases);
    let keywords = c
        .keywords
        .into_iter()
        .map(|k| r.rewrite_keyword(k))
        .collect();
    ClassDef {
        name: c.name,
        bases,
        keywords,
        body: r.rewrite_body(c.body),
        decorator_list,
    }
}

fn walk_for<R: Rewriter + ?Sized>(r: &mut R, f: For) -> For {
    For {
        target: r.rewrite_boxed(f.target),
        iter: r.rewrite_boxed(f.iter),
        body: r.rewrite_body(f.body),
        orelse: r.rewrite_body(f.orelse),
        type_comment: f.type_comment,
    }
}

fn walk_with<R: Rewriter + ?Sized>(r: &mut R, w: With) -> With {
    With {
        items: w.items.into_iter().map(|i| r.rewrite_with_item(i)).collect(),
        body: r.rewrite_body(w.body),
        type_comment: w.type_comment,
    }
}

fn walk_try<R: Rewriter + ?Sized>(r: &mut R, t: Try) -> Try {
    Try {
        body: r.rewrite_body(t.body),
        handlers: t
            .handlers
            .into_iter()
            .map(|h| r.rewrite_handler(h))
            .collect(),
        orelse: r.rewrite_body(t.orelse),
        finalbody: r.rewrite_body(t.finalbody),
    }
}

pub fn walk_stmt<R: Rewriter + ?Sized>(r: &mut R, stmt: Stmt) -> Stmt {
    match stmt {
        Stmt::FunctionDef(f) => Stmt::FunctionDef(walk_function(r, f)),
        Stmt::AsyncFunctionDef(f) => Stmt::AsyncFunctionDef(walk_function(r, f)),
        Stmt::ClassDef(c) => Stmt::ClassDef(walk_class(r, c)),
        Stmt::Return { value } => Stmt::Return {
            value: r.rewrite_opt(value),
        },
        Stmt::Delete { targets } => Stmt::Delete {
            targets: r.rewrite_exprs(targets),
        },
        Stmt::Assign {
            targets,
            value,
            type_comment,
        } => Stmt::Assign {
            targets: r.rewrite_exprs(targets),
            value: r.rewrite_boxed(value),
            type_comment,
        },
        Stmt::AugAssign { target, op, value } => Stmt::AugAssign {
            target: r.rewrite_boxed(target),
            op,
            value: r.rewrite_boxed(value),
        },
        Stmt::AnnAssign {
            target,
            annotation,
            value,
            simple,
        } => Stmt::AnnAssign {
            target: r.rewrite_boxed(target),
            annotation: r.rewrite_boxed(annotation),
            value: r.rewrite_opt(value),
            simple,
        },
        Stmt::For(f) => Stmt::For(walk_for(r, f)),
        Stmt::AsyncFor(f) => Stmt::AsyncFor(walk_for(r, f)),
        Stmt::While { test, body, orelse } => Stmt::While {
            test: r.rewrite_boxed(test),
            body: r.rewrite_body(body),
            orelse: r.rewrite_body(orelse),
        },
        Stmt::If { test, body, orelse } => Stmt::If {
            test: r.rewrite_boxed(test),
            body: r.rewrite_body(body),
            orelse: r.rewrite_body(orelse),
        },
        Stmt::With(w) => Stmt::With(walk_with(r, w)),
        Stmt::AsyncWith(w) => Stmt::AsyncWith(walk_with(r, w)),
        Stmt::Match { subject, cases } => Stmt::Match {
            subject: r.rewrite_boxed(subject),
            cases: cases
                .into_iter()
                .map(|c| r.rewrite_match_case(c))
                .collect(),
        },
        Stmt::Raise { exc, cause } => Stmt::Raise {
            exc: r.rewrite_opt(exc),
            cause: r.rewrite_opt(cause),
        },
        Stmt::Try(t) => Stmt::Try(walk_try(r, t)),
        Stmt::TryStar(t) => Stmt::TryStar(walk_try(r, t)),
        Stmt::Assert { test, msg } => Stmt::Assert {
            test: r.rewrite_boxed(test),
            msg: r.rewrite_opt(msg),
        },
        Stmt::Import { names } => Stmt::Import {
            names: names.into_iter().map(|a| r.rewrite_alias(a)).collect(),
        },
        Stmt::ImportFrom {
            module,
            names,
            level,
        } => Stmt::ImportFrom {
            module,
            names: names.into_iter().map(|a| r.rewrite_alias(a)).collect(),
            level,
        },
        Stmt::Expr { value } => Stmt::Expr {
            value: r.rewrite_boxed(value),
        },
        s @ (Stmt::Global { .. }
        | Stmt::Nonlocal { .. }
        | Stmt::Pass
        | Stmt::Break
        | Stmt::Continue) => s,
    }
}

fn rewrite_generators<R: Rewriter + ?Sized>(
    r: &mut R,
    generators: Vec<Comprehension>,
) -> Vec<Comprehension> {
    generators
        .into_iter()
        .map(|g| r.rewrite_comprehension(g))
        .collect()
}

pub fn walk_expr<R: Rewriter + ?Sized>(r: &mut R, expr: Expr) -> Expr {
    match expr {
        Expr::BoolOp { op, values } => Expr::BoolOp {
            op,
            values: r.rewrite_exprs(values),
        },
        Expr::NamedExpr { target, value } => Expr::NamedExpr {
            target: r.rewrite_boxed(target),
            value: r.rewrite_boxed(value),
        },
        Expr::BinOp { left, op, right } => Expr::BinOp {
            left: r.rewrite_boxed(left),
            op,
            right: r.rewrite_boxed(right),
        },
        Expr::UnaryOp { op, operand } => Expr::UnaryOp {
            op,
            operand: r.rewrite_boxed(operand),
        },
        Expr::Lambda { args, body } => Expr::Lambda {
            args: Box::new(r.rewrite_arguments(*args)),
            body: r.rewrite_boxed(body),
        },
        Expr::IfExp { test, body, orelse } => Expr::IfExp {
            test: r.rewrite_boxed(test),
            body: r.rewrite_boxed(body),
            orelse: r.rewrite_boxed(orelse),
        },
        Expr::Dict { keys, values } => Expr::Dict {
            keys: keys
                .into_iter()
                .map(|k| k.map(|k| r.rewrite_expr(k)))
                .collect(),
            values: r.rewrite_exprs(values),
        },
        Expr::Set { elts } => Expr::Set {
            elts: r.rewrite_exprs(elts),
        },
        Expr::ListComp { elt, generators } => Expr::ListComp {
            elt: r.rewrite_boxed(elt),
            generators: rewrite_generators(r, generators),
        },
        Expr::SetComp { elt, generators } => Expr::SetComp {
            elt: r.rewrite_boxed(elt),
            generators: rewrite_generators(r, generators),
        },
        Expr::DictComp {
            key,
            value,
            generators,
        } => Expr::DictComp {
            key: r.rewrite_boxed(key),
            value: r.rewrite_boxed(value),
            generators: rewrite_generators(r, generators),
        },
        Expr::GeneratorExp { elt, generators } => Expr::GeneratorExp {
            elt: r.rewrite_boxed(elt),
            generators: rewrite_generators(r, generators),
        },
        Expr::Await { value } => Expr::Await {
            value: r.rewrite_boxed(value),
        },
        Expr::Yield { value } => Expr::Yield {
            value: r.rewrite_opt(value),
        },
        Expr::YieldFrom { value } => Expr::YieldFrom {
            value: r.rewrite_boxed(value),
        },
        Expr::Compare {
            left,
            ops,
            comparators,
        } => Expr::Compare {
            left: r.rewrite_boxed(left),
            ops,
            comparators: r.rewrite_exprs(comparators),
        },
        Expr::Call {
            func,
            args,
            keywords,
        } => Expr::Call {
            func: r.rewrite_boxed(func),
            args: r.rewrite_exprs(args),
            keywords: keywords.into_iter().map(|k| r.rewrite_keyword(k)).collect(),
        },
        Expr::FormattedValue {
            value,
            conversion,
            format_spec,
        } => Expr::FormattedValue {
            value: r.rewrite_boxed(value),
            conversion,
            format_spec: r.rewrite_opt(format_spec),
        },
        Expr::JoinedStr { values } => Expr::JoinedStr {
            values: r.rewrite_exprs(values),
        },
        Expr::Attribute { value, attr, ctx } => Expr::Attribute {
            value: r.rewrite_boxed(value),
            attr,
            ctx,
        },
        Expr::Subscript { value, slice, ctx } => Expr::Subscript {
            value: r.rewrite_boxed(value),
            slice: r.rewrite_boxed(slice),
            ctx,
        },
        Expr::Starred { value, ctx } => Expr::Starred {
            value: r.rewrite_boxed(value),
            ctx,
        },
        Expr::List { elts, ctx } => Expr::List {
            elts: r.rewrite_exprs(elts),
            ctx,
        },
        Expr::Tuple { elts, ctx } => Expr::Tuple {
            elts: r.rewrite_exprs(elts),
            ctx,
        },
        Expr::Slice { lower, upper, step } => Expr::Slice {
            lower: r.rewrite_opt(lower),
            upper: r.rewrite_opt(upper),
            step: r.rewrite_opt(step),
        },
        e @ (Expr::Constant { .. } | Expr::Name { .. }) => e,
    }
}

pub fn walk_pattern<R: Rewriter + ?Sized>(r: &mut R, pattern: Pattern) -> Pattern {
    let sub = |ps: Vec<Pattern>, r: &mut R| -> Vec<Pattern> {
        ps.into_iter().map(|p| r.rewrite_pattern(p)).collect()
    };
    match pattern {
        Pattern::MatchValue { value } => Pattern::MatchValue {
            value: r.rewrite_boxed(value),
        },
        Pattern::MatchSequence { patterns } => Pattern::MatchSequence {
            patterns: sub(patterns, r),
        },
        Pattern::MatchMapping {
            keys,
            patterns,
            rest,
        } => Pattern::MatchMapping {
            keys: r.rewrite_exprs(keys),
            patterns: sub(patterns, r),
            rest,
        },
        Pattern::MatchClass {
            cls,
            patterns,
            kwd_attrs,
            kwd_patterns,
        } => Pattern::MatchClass {
            cls: r.rewrite_boxed(cls),
            patterns: sub(patterns, r),
            kwd_attrs,
            kwd_patterns: sub(kwd_patterns, r),
        },
        Pattern::MatchAs { pattern, name } => Pattern::MatchAs {
            pattern: pattern.map(|p| Box::new(r.rewrite_pattern(*p))),
            name,
        },
        Pattern::MatchOr { patterns } => Pattern::MatchOr {
            patterns: sub(patterns, r),
        },
        p @ (Pattern::MatchSingleton { .. } | Pattern::MatchStar { .. }) => p,
    }
}

pub fn walk_arguments<R: Rewriter + ?Sized>(r: &mut R, a: Arguments) -> Arguments {
    let posonlyargs = a.posonlyargs.into_iter().map(|x| r.rewrite_arg(x)).collect();
    let args = a.args.into_iter().map(|x| r.rewrite_arg(x)).collect();
    let vararg = a.vararg.map(|x| r.rewrite_arg(x));
    let kwonlyargs = a.kwonlyargs.into_iter().map(|x| r.rewrite_arg(x)).collect();
    let kw_defaults = a
        .kw_defaults
        .into_iter()
        .map(|d| d.map(|d| r.rewrite_expr(d)))
        .collect();
    let kwarg = a.kwarg.map(|x| r.rewrite_arg(x));
    let defaults = r.rewrite_exprs(a.defaults);
    Arguments {
        posonlyargs,
        args,
        vararg,
        kwonlyargs,
        kw_defaults,
        kwarg,
        defaults,
    }
}

pub fn walk_arg<R: Rewriter + ?Sized>(r: &mut R, a: Arg) -> Arg {
    Arg {
        arg: a.arg,
        annotation: r.rewrite_opt(a.annotation),
        type_comment: a.type_comment,
    }
}

pub fn walk_comprehension<R: Rewriter + ?Sized>(r: &mut R, c: Comprehension) -> Comprehension {
    Comprehension {
        target: r.rewrite_expr(c.target),
        iter: r.rewrite_expr(c.iter),
        ifs: r.rewrite_exprs(c.ifs),
        is_async: c.is_async,
    }
}

pub fn walk_handler<R: Rewriter + ?Sized>(r: &mut R, h: ExceptHandler) -> ExceptHandler {
    ExceptHandler {
        type_: r.rewrite_opt(h.type_),
        name: h.name,
        body: r.rewrite_body(h.body),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constant::Constant;

    struct Doubler;

    impl Rewriter for Doubler {
        fn rewrite_expr(&mut self, expr: Expr) -> Expr {
            match expr {
                Expr::Constant {
                    value: Constant::Int(v),
                    kind,
                } => Expr::Constant {
                    value: Constant::Int(v * 2),
                    kind,
                },
                e => walk_expr(self, e),
            }
        }
    }

    #[test]
    fn replaces_nested_nodes_bottom_up() {
        let module = Module::new(vec![Stmt::If {
            test: Box::new(Expr::name("x")),
            body: vec![Stmt::assign("y", Expr::call(Expr::name("f"), vec![Expr::constant(Constant::int(21))]))],
            orelse: vec![],
        }]);
        let out = Doubler.rewrite_module(module);
        let Stmt::If { body, .. } = &out.body[0] else {
            panic!("shape changed")
        };
        let Stmt::Assign { value, .. } = &body[0] else {
            panic!("shape changed")
        };
        let Expr::Call { args, .. } = value.as_ref() else {
            panic!("shape changed")
        };
        assert_eq!(args[0].as_constant(), Some(&Constant::int(42)));
    }
}
