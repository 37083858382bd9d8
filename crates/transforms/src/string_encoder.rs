use crate::{PassContext, Transform};
use base64::{engine::general_purpose::STANDARD, Engine};
use pyveil_core::ast::*;
use pyveil_core::build;
use pyveil_core::fold::{self, Rewriter};
use pyveil_utils::errors::TransformError;
use std::io::Write;
use tracing::debug;
use xz2::write::XzEncoder;

/// Replaces `str` and `bytes` literals with base64 payloads, xz-compressed
/// when `compress` is set and the literal is not part of an f-string.
#[derive(Debug, Clone, Copy)]
pub struct StringEncoder {
    pub compress: bool,
}

impl Default for StringEncoder {
    fn default() -> Self {
        Self { compress: true }
    }
}

fn xz(data: &[u8]) -> Result<Vec<u8>, TransformError> {
    let mut enc = XzEncoder::new(Vec::new(), 9);
    enc.write_all(data)
        .and_then(|()| enc.finish())
        .map_err(|e| TransformError::Generic(format!("xz compression failed: {e}")))
}

/// Builds the replacement for one literal. `text` appends `.decode()`.
fn encode(raw: &[u8], text: bool, compress: bool) -> Result<Expr, TransformError> {
    let b64 = STANDARD.encode(raw).into_bytes();
    let payload = if compress {
        build::method_call(
            build::import_module("lzma"),
            "decompress",
            vec![build::bytes_lit(xz(&b64)?)],
        )
    } else {
        build::bytes_lit(b64)
    };
    let decoded = build::method_call(build::import_module("base64"), "b64decode", vec![payload]);
    Ok(if text {
        build::method_call(decoded, "decode", vec![])
    } else {
        decoded
    })
}

struct Encoder {
    compress: bool,
    /// Nesting depth of f-strings around the current expression.
    fstring: usize,
    count: usize,
    error: Option<TransformError>,
}

impl Encoder {
    fn literal(&mut self, value: Constant, compress: bool) -> Expr {
        let encoded = match &value {
            Constant::Str(s) => encode(s.as_bytes(), true, compress),
            Constant::Bytes(b) => encode(b, false, compress),
            _ => return Expr::constant(value),
        };
        match encoded {
            Ok(e) => {
                self.count += 1;
                e
            }
            Err(err) => {
                self.error.get_or_insert(err);
                Expr::constant(value)
            }
        }
    }
}

impl Rewriter for Encoder {
    fn rewrite_expr(&mut self, expr: Expr) -> Expr {
        match expr {
            Expr::Constant { value, .. } if value.is_str_or_bytes() => {
                self.literal(value, self.compress && self.fstring == 0)
            }
            // f-string text parts become slots; nothing under an f-string is
            // compressed so every rendered slot holds only ASCII
            Expr::JoinedStr { values } => {
                self.fstring += 1;
                let values = values
                    .into_iter()
                    .map(|v| match v {
                        Expr::Constant { value, .. } if value.is_str_or_bytes() => {
                            build::formatted(self.literal(value, false))
                        }
                        Expr::FormattedValue {
                            value,
                            conversion,
                            format_spec,
                        } => Expr::FormattedValue {
                            value: self.rewrite_boxed(value),
                            conversion,
                            format_spec,
                        },
                        other => self.rewrite_expr(other),
                    })
                    .collect();
                self.fstring -= 1;
                Expr::JoinedStr { values }
            }
            other => fold::walk_expr(self, other),
        }
    }

    fn rewrite_pattern(&mut self, pattern: Pattern) -> Pattern {
        pattern
    }
}

impl Transform for StringEncoder {
    fn name(&self) -> &'static str {
        "string_encoder"
    }

    fn apply(&self, module: Module, ctx: &mut PassContext<'_>) -> Result<Module, TransformError> {
        let mut encoder = Encoder {
            compress: self.compress,
            fstring: 0,
            count: 0,
            error: None,
        };
        let module = encoder.rewrite_module(module);
        if let Some(e) = encoder.error {
            return Err(e);
        }
        debug!(path = %ctx.path.display(), literals = encoder.count, "encoded strings");
        Ok(module)
    }
}
