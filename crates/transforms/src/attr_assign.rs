use crate::{PassContext, Transform};
use pyveil_core::ast::*;
use pyveil_core::build;
use pyveil_core::fold::{self, Rewriter};
use pyveil_utils::errors::TransformError;
use tracing::debug;

/// Turns `obj.field = value` into `setattr(obj, 'field', value)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AttrAssign;

/// Private-name mangling as the compiler applies it inside `class_name`.
pub fn mangle(class_name: &str, attr: &str) -> String {
    let is_private = attr.starts_with("__") && !attr.ends_with("__");
    let stripped = class_name.trim_start_matches('_');
    if !is_private || stripped.is_empty() {
        return attr.to_owned();
    }
    format!("_{stripped}{attr}")
}

#[derive(Default)]
struct Rewrite {
    classes: Vec<String>,
    count: usize,
}

impl Rewriter for Rewrite {
    fn rewrite_stmt(&mut self, stmt: Stmt) -> Stmt {
        match stmt {
            Stmt::ClassDef(c) => {
                self.classes.push(c.name.clone());
                let c = fold::walk_class(self, c);
                self.classes.pop();
                Stmt::ClassDef(c)
            }
            Stmt::Assign {
                targets,
                value,
                type_comment,
            } => match <[Expr; 1]>::try_from(targets) {
                Ok([Expr::Attribute {
                    value: obj, attr, ..
                }]) => {
                    let attr = match self.classes.last() {
                        Some(class) => mangle(class, &attr),
                        None => attr,
                    };
                    self.count += 1;
                    Stmt::expr(Expr::call(
                        Expr::name("setattr"),
                        vec![
                            self.rewrite_expr(*obj),
                            build::str_lit(&attr),
                            self.rewrite_expr(*value),
                        ],
                    ))
                }
                Ok(single) => fold::walk_stmt(
                    self,
                    Stmt::Assign {
                        targets: single.into(),
                        value,
                        type_comment,
                    },
                ),
                Err(targets) => fold::walk_stmt(
                    self,
                    Stmt::Assign {
                        targets,
                        value,
                        type_comment,
                    },
                ),
            },
            other => fold::walk_stmt(self, other),
        }
    }
}

impl Transform for AttrAssign {
    fn name(&self) -> &'static str {
        "attr_assign"
    }

    fn apply(&self, module: Module, ctx: &mut PassContext<'_>) -> Result<Module, TransformError> {
        let mut rewrite = Rewrite::default();
        let module = rewrite.rewrite_module(module);
        debug!(path = %ctx.path.display(), assignments = rewrite.count, "rewrote attribute stores");
        Ok(module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};
    use std::path::Path;

    fn store(obj: &str, attr: &str) -> Expr {
        Expr::Attribute {
            value: Box::new(Expr::name(obj)),
            attr: attr.into(),
            ctx: ExprContext::Store,
        }
    }

    fn setattr(obj: &str, attr: &str, value: Expr) -> Stmt {
        Stmt::expr(Expr::call(
            Expr::name("setattr"),
            vec![Expr::name(obj), build::str_lit(attr), value],
        ))
    }

    fn run(module: Module) -> Module {
        let mut rng = StdRng::seed_from_u64(0);
        let mut ctx = PassContext::single(Path::new("m.py"), &mut rng);
        AttrAssign.apply(module, &mut ctx).unwrap()
    }

    #[test]
    fn mangling_rules() {
        assert_eq!(mangle("C", "__x"), "_C__x");
        assert_eq!(mangle("_Priv", "__x"), "_Priv__x");
        assert_eq!(mangle("C", "__init__"), "__init__");
        assert_eq!(mangle("C", "_x"), "_x");
        assert_eq!(mangle("___", "__x"), "__x");
    }

    #[test]
    fn single_attribute_targets_only() {
        let one = Expr::constant(Constant::int(1));
        let method = Stmt::FunctionDef(FunctionDef {
            name: "m".into(),
            args: Box::default(),
            body: vec![Stmt::Assign {
                targets: vec![store("self", "__secret")],
                value: Box::new(one.clone()),
                type_comment: None,
            }],
            decorator_list: vec![],
            returns: None,
            type_comment: None,
        });
        let chained = Stmt::Assign {
            targets: vec![store("a", "x"), store("b", "x")],
            value: Box::new(one.clone()),
            type_comment: None,
        };
        let module = Module::new(vec![
            Stmt::Assign {
                targets: vec![store("o", "f")],
                value: Box::new(one.clone()),
                type_comment: None,
            },
            chained.clone(),
            Stmt::ClassDef(ClassDef {
                name: "C".into(),
                bases: vec![],
                keywords: vec![],
                body: vec![method],
                decorator_list: vec![],
            }),
        ]);
        let out = run(module);
        assert_eq!(out.body[0], setattr("o", "f", one.clone()));
        assert_eq!(out.body[1], chained);
        let Stmt::ClassDef(c) = &out.body[2] else {
            panic!("expected a class");
        };
        let Stmt::FunctionDef(f) = &c.body[0] else {
            panic!("expected a method");
        };
        assert_eq!(f.body[0], setattr("self", "_C__secret", one));
    }
}
