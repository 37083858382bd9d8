use crate::{PassContext, Transform};
use pyveil_core::ast::*;
use pyveil_core::build;
use pyveil_core::fold::{self, Rewriter};
use pyveil_utils::errors::TransformError;
use tracing::debug;

/// Lowers f-strings to `'<format>'.format(...)` calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct FStringToFormat;

fn escape(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '{' => out.push_str("{{"),
            '}' => out.push_str("}}"),
            c => out.push(c),
        }
    }
}

/// The text of a format spec made only of literal parts.
fn constant_spec(spec: &Expr) -> Option<String> {
    match spec {
        Expr::JoinedStr { values } => values
            .iter()
            .map(|v| match v.as_constant() {
                Some(Constant::Str(s)) => Some(s.as_str()),
                _ => None,
            })
            .collect(),
        _ => None,
    }
}

const fn conversion_fn(conversion: i32) -> Option<&'static str> {
    match conversion {
        115 => Some("str"),
        114 => Some("repr"),
        97 => Some("ascii"),
        _ => None,
    }
}

fn lowerable(part: &Expr) -> bool {
    match part {
        Expr::Constant {
            value: Constant::Str(_),
            ..
        } => true,
        Expr::FormattedValue { format_spec, .. } => {
            format_spec.as_deref().is_none_or(|spec| constant_spec(spec).is_some())
        }
        _ => false,
    }
}

/// Lowers one f-string, or gives it back when a slot has a computed spec.
fn lower(values: Vec<Expr>) -> Result<Expr, Vec<Expr>> {
    if !values.iter().all(lowerable) {
        return Err(values);
    }

    let mut format = String::new();
    let mut args = Vec::new();
    for v in values {
        match v {
            Expr::Constant {
                value: Constant::Str(s),
                ..
            } => escape(&s, &mut format),
            Expr::FormattedValue {
                value,
                conversion,
                format_spec,
            } => {
                format.push('{');
                if let Some(spec) = format_spec.as_deref().and_then(constant_spec) {
                    format.push(':');
                    format.push_str(&spec);
                }
                format.push('}');
                args.push(match conversion_fn(conversion) {
                    Some(f) => Expr::call(Expr::name(f), vec![*value]),
                    None => *value,
                });
            }
            _ => {}
        }
    }
    Ok(build::method_call(build::str_lit(&format), "format", args))
}

#[derive(Default)]
struct Lowering {
    count: usize,
}

impl Rewriter for Lowering {
    fn rewrite_expr(&mut self, expr: Expr) -> Expr {
        match expr {
            Expr::JoinedStr { values } => match lower(self.rewrite_exprs(values)) {
                Ok(call) => {
                    self.count += 1;
                    call
                }
                Err(values) => Expr::JoinedStr { values },
            },
            // a spec is itself a JoinedStr but must stay one
            Expr::FormattedValue {
                value,
                conversion,
                format_spec,
            } => Expr::FormattedValue {
                value: self.rewrite_boxed(value),
                conversion,
                format_spec: format_spec.map(|spec| match *spec {
                    Expr::JoinedStr { values } => Box::new(Expr::JoinedStr {
                        values: self.rewrite_exprs(values),
                    }),
                    other => self.rewrite_boxed(Box::new(other)),
                }),
            },
            other => fold::walk_expr(self, other),
        }
    }

    fn rewrite_pattern(&mut self, pattern: Pattern) -> Pattern {
        pattern
    }
}

impl Transform for FStringToFormat {
    fn name(&self) -> &'static str {
        "fstring_to_format"
    }

    fn apply(&self, module: Module, ctx: &mut PassContext<'_>) -> Result<Module, TransformError> {
        let mut lowering = Lowering::default();
        let module = lowering.rewrite_module(module);
        debug!(path = %ctx.path.display(), fstrings = lowering.count, "lowered f-strings");
        Ok(module)
    }
}
