//! Rewrites every reference of a file through its [`SymbolMapping`].
use super::{SymbolKey, SymbolMapping};
use pyveil_core::ast::*;
use pyveil_core::fold::{self, Rewriter};
use pyveil_core::scope::{Bindings, Frame, Resolution, ScopeNamer, ScopeStack};

struct Applicator<'m> {
    mapping: &'m SymbolMapping,
    scopes: ScopeStack,
    namer: ScopeNamer,
}

impl<'m> Applicator<'m> {
    fn lookup(&self, name: &str, walrus: bool) -> Option<&'m str> {
        let resolution = if walrus {
            self.scopes.resolve_walrus(name)
        } else {
            self.scopes.resolve(name)
        };
        let key = match resolution {
            Resolution::Module => SymbolKey::Module(name.to_owned()),
            Resolution::Class => SymbolKey::Attribute(name.to_owned()),
            Resolution::Local(scope) => SymbolKey::Local {
                scope: scope.clone(),
                name: name.to_owned(),
            },
            Resolution::Shadowed => return None,
        };
        self.mapping.get(&key)
    }

    fn rename(&self, name: String) -> String {
        self.lookup(&name, false).map_or(name, str::to_owned)
    }

    fn attribute(&self, attr: String) -> String {
        self.mapping.attribute(&attr).map_or(attr, str::to_owned)
    }

    fn function(&mut self, f: FunctionDef) -> FunctionDef {
        let bindings = Bindings::of_function(&f);
        let original = f.name;
        let name = self.rename(original.clone());

        // decorators, annotations and defaults belong to the enclosing scope
        let decorator_list = self.rewrite_exprs(f.decorator_list);
        let mut args = self.rewrite_arguments(*f.args);
        let returns = self.rewrite_opt(f.returns);

        let id = self.namer.enter(&original);
        for a in args.all_mut() {
            let key = SymbolKey::Local {
                scope: id.clone(),
                name: a.arg.clone(),
            };
            if let Some(new) = self.mapping.get(&key) {
                a.arg = new.to_owned();
            }
        }
        self.scopes.push(Frame::Function { id, bindings });
        let body = self.rewrite_body(f.body);
        self.scopes.pop();
        self.namer.exit();

        FunctionDef {
            name,
            args: Box::new(args),
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
        let name = self.rename(c.name);
        self.scopes.push(Frame::Class(members));
        let body = self.rewrite_body(c.body);
        self.scopes.pop();
        self.namer.exit();

        ClassDef {
            name,
            bases,
            keywords,
            body,
            decorator_list,
        }
    }

    /// The first iterable is evaluated outside the comprehension; everything
    /// else, including `inner`, runs in its scope.
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

impl Rewriter for Applicator<'_> {
    fn rewrite_stmt(&mut self, stmt: Stmt) -> Stmt {
        match stmt {
            Stmt::FunctionDef(f) => Stmt::FunctionDef(self.function(f)),
            Stmt::AsyncFunctionDef(f) => Stmt::AsyncFunctionDef(self.function(f)),
            Stmt::ClassDef(c) => Stmt::ClassDef(self.class(c)),
            Stmt::Global { names } => Stmt::Global {
                names: names
                    .into_iter()
                    .map(|n| self.mapping.module(&n).map_or(n, str::to_owned))
                    .collect(),
            },
            Stmt::Nonlocal { names } => Stmt::Nonlocal {
                names: names.into_iter().map(|n| self.rename(n)).collect(),
            },
            other => fold::walk_stmt(self, other),
        }
    }

    fn rewrite_expr(&mut self, expr: Expr) -> Expr {
        match expr {
            Expr::Name { id, ctx } => Expr::Name {
                id: self.rename(id),
                ctx,
            },
            Expr::NamedExpr { target, value } => {
                let target = match *target {
                    Expr::Name { id, ctx } => Expr::Name {
                        id: self.lookup(&id, true).map_or(id, str::to_owned),
                        ctx,
                    },
                    other => self.rewrite_expr(other),
                };
                Expr::NamedExpr {
                    target: Box::new(target),
                    value: self.rewrite_boxed(value),
                }
            }
            Expr::Attribute { value, attr, ctx } => Expr::Attribute {
                value: self.rewrite_boxed(value),
                attr: self.attribute(attr),
                ctx,
            },
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

    fn rewrite_pattern(&mut self, pattern: Pattern) -> Pattern {
        match fold::walk_pattern(self, pattern) {
            Pattern::MatchAs { pattern, name } => Pattern::MatchAs {
                pattern,
                name: name.map(|n| self.rename(n)),
            },
            Pattern::MatchStar { name } => Pattern::MatchStar {
                name: name.map(|n| self.rename(n)),
            },
            Pattern::MatchMapping {
                keys,
                patterns,
                rest,
            } => Pattern::MatchMapping {
                keys,
                patterns,
                rest: rest.map(|n| self.rename(n)),
            },
            Pattern::MatchClass {
                cls,
                patterns,
                kwd_attrs,
                kwd_patterns,
            } => Pattern::MatchClass {
                cls,
                patterns,
                kwd_attrs: kwd_attrs.into_iter().map(|a| self.attribute(a)).collect(),
                kwd_patterns,
            },
            other => other,
        }
    }

    fn rewrite_handler(&mut self, handler: ExceptHandler) -> ExceptHandler {
        let handler = fold::walk_handler(self, handler);
        ExceptHandler {
            name: handler.name.map(|n| self.rename(n)),
            ..handler
        }
    }
}

/// Applies `mapping` to `module`. Keyword argument names are left alone;
/// parameters that are ever passed by keyword are never renamed.
pub fn apply(module: Module, mapping: &SymbolMapping) -> Module {
    let mut applicator = Applicator {
        mapping,
        scopes: ScopeStack::new(&module),
        namer: ScopeNamer::default(),
    };
    applicator.rewrite_module(module)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::NamingTemplate;
    use crate::renamer::generator;
    use pyveil_core::visit::IdentifierCollector;
    use std::path::Path;

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

    fn rename(module: Module) -> Module {
        let mut t = NamingTemplate::parse("{kind}{n}").unwrap();
        let mapping = generator::generate(&module, Path::new("/src/m.py"), None, &mut t).unwrap();
        apply(module, &mapping)
    }

    #[test]
    fn references_follow_declarations() {
        // def greet(who): return "hi " + who
        // print(greet("bob"))
        let module = Module::new(vec![
            def(
                "greet",
                &["who"],
                vec![Stmt::Return {
                    value: Some(Box::new(Expr::BinOp {
                        left: Box::new(Expr::constant(Constant::str("hi "))),
                        op: Operator::Add,
                        right: Box::new(Expr::name("who")),
                    })),
                }],
            ),
            Stmt::expr(Expr::call(
                Expr::name("print"),
                vec![Expr::call(
                    Expr::name("greet"),
                    vec![Expr::constant(Constant::str("bob"))],
                )],
            )),
        ]);
        let out = rename(module);
        let ids = IdentifierCollector::collect(&out);
        assert!(!ids.contains("greet"));
        assert!(!ids.contains("who"));
        assert!(ids.contains("print"));

        let Stmt::FunctionDef(f) = &out.body[0] else {
            panic!("expected a function");
        };
        assert_eq!(f.name, "method0");
        assert_eq!(f.args.args[0].arg, "arg0");
        let Stmt::Expr { value } = &out.body[1] else {
            panic!("expected a call");
        };
        let Expr::Call { args, .. } = value.as_ref() else {
            panic!("expected a call");
        };
        assert_eq!(
            args[0],
            Expr::call(Expr::name("method0"), vec![Expr::constant(Constant::str("bob"))])
        );
    }

    #[test]
    fn comprehension_targets_and_lambda_params_shadow() {
        // x = 1
        // ys = [x for x in range(3)]
        // f = lambda x: x
        let module = Module::new(vec![
            Stmt::assign("x", Expr::constant(Constant::int(1))),
            Stmt::assign(
                "ys",
                Expr::ListComp {
                    elt: Box::new(Expr::name("x")),
                    generators: vec![Comprehension {
                        target: Expr::store("x"),
                        iter: Expr::call(Expr::name("range"), vec![Expr::constant(Constant::int(3))]),
                        ifs: vec![],
                        is_async: 0,
                    }],
                },
            ),
            Stmt::assign(
                "f",
                Expr::Lambda {
                    args: Box::new(Arguments {
                        args: vec![Arg::new("x")],
                        ..Default::default()
                    }),
                    body: Box::new(Expr::name("x")),
                },
            ),
        ]);
        let out = rename(module);
        let Stmt::Assign { targets, .. } = &out.body[0] else {
            panic!("expected an assignment");
        };
        assert_eq!(targets[0], Expr::store("var0"));
        let Stmt::Assign { value, .. } = &out.body[1] else {
            panic!("expected an assignment");
        };
        let Expr::ListComp { elt, generators } = value.as_ref() else {
            panic!("expected a comprehension");
        };
        assert_eq!(**elt, Expr::name("x"));
        assert_eq!(generators[0].target, Expr::store("x"));
        let Stmt::Assign { value, .. } = &out.body[2] else {
            panic!("expected an assignment");
        };
        let Expr::Lambda { args, body } = value.as_ref() else {
            panic!("expected a lambda");
        };
        assert_eq!(args.args[0].arg, "x");
        assert_eq!(**body, Expr::name("x"));
    }

    #[test]
    fn methods_and_fields_use_attribute_names() {
        // class Box:
        //     def __init__(self, v): self.v = v
        //     def fetch(self): return self.v
        let init = def(
            "__init__",
            &["self", "v"],
            vec![Stmt::Assign {
                targets: vec![Expr::Attribute {
                    value: Box::new(Expr::name("self")),
                    attr: "v".into(),
                    ctx: ExprContext::Store,
                }],
                value: Box::new(Expr::name("v")),
                type_comment: None,
            }],
        );
        let fetch = def(
            "fetch",
            &["self"],
            vec![Stmt::Return {
                value: Some(Box::new(Expr::attr(Expr::name("self"), "v"))),
            }],
        );
        let module = Module::new(vec![Stmt::ClassDef(ClassDef {
            name: "Box".into(),
            bases: vec![],
            keywords: vec![],
            body: vec![init, fetch],
            decorator_list: vec![],
        })]);
        let out = rename(module);
        let ids = IdentifierCollector::collect(&out);
        assert!(ids.contains("__init__"));
        for gone in ["Box", "fetch", "v", "self"] {
            assert!(!ids.contains(gone), "{gone} survived");
        }
    }
}
