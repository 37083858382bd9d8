//! Small constructors for the expressions passes splice into trees.
use crate::ast::{Arguments, Expr, ExprContext, FunctionDef, Stmt};
use crate::constant::Constant;

/// `__import__('<module>')`
pub fn import_module(module: &str) -> Expr {
    Expr::call(Expr::name("__import__"), vec![str_lit(module)])
}

pub fn str_lit(s: &str) -> Expr {
    Expr::constant(Constant::str(s))
}

pub fn bytes_lit(b: Vec<u8>) -> Expr {
    Expr::constant(Constant::Bytes(b))
}

pub fn int_lit(v: i64) -> Expr {
    Expr::constant(Constant::int(v))
}

pub fn method_call(receiver: Expr, method: &str, args: Vec<Expr>) -> Expr {
    Expr::call(Expr::attr(receiver, method), args)
}

pub const fn tuple(elts: Vec<Expr>) -> Expr {
    Expr::Tuple {
        elts,
        ctx: ExprContext::Load,
    }
}

pub const fn list(elts: Vec<Expr>) -> Expr {
    Expr::List {
        elts,
        ctx: ExprContext::Load,
    }
}

pub fn starred(value: Expr) -> Expr {
    Expr::Starred {
        value: Box::new(value),
        ctx: ExprContext::Load,
    }
}

/// `lambda <params>: <body>` with plain positional parameters.
pub fn lambda(params: &[&str], body: Expr) -> Expr {
    Expr::Lambda {
        args: Box::new(Arguments {
            args: params.iter().map(|p| crate::ast::Arg::new(*p)).collect(),
            ..Arguments::default()
        }),
        body: Box::new(body),
    }
}

/// A `def <name>():` with no parameters or decorators.
pub fn function(name: &str, body: Vec<Stmt>) -> Stmt {
    Stmt::FunctionDef(FunctionDef {
        name: name.to_owned(),
        args: Box::default(),
        body,
        decorator_list: Vec::new(),
        returns: None,
        type_comment: None,
    })
}

/// Wraps an expression as an f-string slot with no conversion.
pub fn formatted(value: Expr) -> Expr {
    Expr::FormattedValue {
        value: Box::new(value),
        conversion: -1,
        format_spec: None,
    }
}
