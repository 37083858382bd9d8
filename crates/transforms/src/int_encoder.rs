use crate::{PassContext, Transform};
use num_bigint::{BigInt, Sign};
use pyveil_core::ast::*;
use pyveil_core::build;
use pyveil_core::constant::minimal_byte_len;
use pyveil_core::fold::{self, Rewriter};
use pyveil_utils::errors::TransformError;
use rand::{rngs::StdRng, Rng};
use tracing::debug;

/// Replaces integer literals with an expression that rebuilds them from a
/// string of offset-encoded byte values.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntEncoder;

/// One encoded integer: `digits` holds a `width`-digit group per byte, each
/// group being `offset - (byte + index)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedInt {
    pub digits: String,
    pub offset: u64,
    pub width: usize,
    pub negative: bool,
}

fn le_bytes(v: &BigInt, len: usize) -> Vec<u8> {
    let negative = v.sign() == Sign::Minus;
    let mut bytes = if negative {
        v.to_signed_bytes_le()
    } else {
        v.to_bytes_le().1
    };
    bytes.resize(len, if negative { 0xff } else { 0 });
    bytes
}

impl EncodedInt {
    pub fn encode(v: &BigInt, rng: &mut StdRng) -> Self {
        let negative = v.sign() == Sign::Minus;
        let len = minimal_byte_len(v);
        let bytes = le_bytes(v, len);

        let min = 255 + len as u64;
        let mut width = 3;
        while 10u64.pow(width as u32) - 1 < min {
            width += 1;
        }
        let offset = rng.random_range(min..=10u64.pow(width as u32) - 1);

        let digits = bytes
            .iter()
            .enumerate()
            .map(|(i, b)| format!("{:0width$}", offset - (u64::from(*b) + i as u64)))
            .collect();
        Self {
            digits,
            offset,
            width,
            negative,
        }
    }

    /// What the emitted expression evaluates to.
    pub fn decode(&self) -> Option<BigInt> {
        let mut bytes = Vec::with_capacity(self.digits.len() / self.width);
        for (i, chunk) in self.digits.as_bytes().chunks(self.width).enumerate() {
            let group: u64 = std::str::from_utf8(chunk).ok()?.parse().ok()?;
            let byte = self.offset.checked_sub(group + i as u64)?;
            bytes.push(u8::try_from(byte).ok()?);
        }
        Some(if self.negative {
            BigInt::from_signed_bytes_le(&bytes)
        } else {
            BigInt::from_bytes_le(Sign::Plus, &bytes)
        })
    }

    /// `int.from_bytes(map(lambda O, i: off - (int(O) + i),
    ///     map(''.join, zip(*[iter(S)] * w)), range(n)), 'little', signed=neg)`
    pub fn to_expr(&self) -> Expr {
        let decode_group = build::lambda(
            &["O", "i"],
            Expr::BinOp {
                left: Box::new(Expr::constant(Constant::int(self.offset))),
                op: Operator::Sub,
                right: Box::new(Expr::BinOp {
                    left: Box::new(Expr::call(Expr::name("int"), vec![Expr::name("O")])),
                    op: Operator::Add,
                    right: Box::new(Expr::name("i")),
                }),
            },
        );
        let groups = Expr::call(
            Expr::name("map"),
            vec![
                Expr::attr(build::str_lit(""), "join"),
                Expr::call(
                    Expr::name("zip"),
                    vec![build::starred(Expr::BinOp {
                        left: Box::new(build::list(vec![Expr::call(
                            Expr::name("iter"),
                            vec![build::str_lit(&self.digits)],
                        )])),
                        op: Operator::Mult,
                        right: Box::new(build::int_lit(self.width as i64)),
                    })],
                ),
            ],
        );
        let count = Expr::call(
            Expr::name("range"),
            vec![build::int_lit((self.digits.len() / self.width) as i64)],
        );
        Expr::Call {
            func: Box::new(Expr::attr(Expr::name("int"), "from_bytes")),
            args: vec![
                Expr::call(Expr::name("map"), vec![decode_group, groups, count]),
                build::str_lit("little"),
            ],
            keywords: vec![Keyword {
                arg: Some("signed".into()),
                value: Expr::constant(Constant::Bool(self.negative)),
            }],
        }
    }
}

struct Encoder<'a> {
    rng: &'a mut StdRng,
    count: usize,
}

impl Rewriter for Encoder<'_> {
    fn rewrite_expr(&mut self, expr: Expr) -> Expr {
        match expr {
            Expr::Constant {
                value: Constant::Int(v),
                ..
            } => {
                self.count += 1;
                EncodedInt::encode(&v, self.rng).to_expr()
            }
            other => fold::walk_expr(self, other),
        }
    }

    // patterns only accept literals
    fn rewrite_pattern(&mut self, pattern: Pattern) -> Pattern {
        pattern
    }
}

impl Transform for IntEncoder {
    fn name(&self) -> &'static str {
        "int_encoder"
    }

    fn apply(&self, module: Module, ctx: &mut PassContext<'_>) -> Result<Module, TransformError> {
        let mut encoder = Encoder {
            rng: &mut *ctx.rng,
            count: 0,
        };
        let module = encoder.rewrite_module(module);
        debug!(path = %ctx.path.display(), literals = encoder.count, "encoded integers");
        Ok(module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use std::path::Path;

    #[test]
    fn decode_inverts_encode() {
        let mut rng = StdRng::seed_from_u64(7);
        let big: BigInt = "-123456789012345678901234567890".parse().unwrap();
        for v in [
            BigInt::from(0),
            BigInt::from(1),
            BigInt::from(-1),
            BigInt::from(255),
            BigInt::from(-128),
            BigInt::from(-129),
            BigInt::from(65_536),
            big,
        ] {
            let e = EncodedInt::encode(&v, &mut rng);
            assert_eq!(e.digits.len() % e.width, 0);
            assert!(e.offset >= 255 + (e.digits.len() / e.width) as u64);
            assert_eq!(e.decode(), Some(v));
        }
    }

    #[test]
    fn long_values_widen_groups() {
        let mut rng = StdRng::seed_from_u64(1);
        let v = BigInt::from(1) << 6000u32;
        let e = EncodedInt::encode(&v, &mut rng);
        assert_eq!(e.width, 4);
        assert_eq!(e.decode(), Some(v));
    }

    #[test]
    fn leaves_bools_and_patterns() {
        let module = Module::new(vec![
            Stmt::assign("t", Expr::constant(Constant::Bool(true))),
            Stmt::Match {
                subject: Box::new(Expr::name("t")),
                cases: vec![MatchCase {
                    pattern: Pattern::MatchValue {
                        value: Box::new(Expr::constant(Constant::int(3))),
                    },
                    guard: None,
                    body: vec![Stmt::Pass],
                }],
            },
            Stmt::assign("n", Expr::constant(Constant::int(3))),
        ]);
        let mut rng = StdRng::seed_from_u64(0);
        let mut ctx = PassContext::single(Path::new("m.py"), &mut rng);
        let out = IntEncoder.apply(module.clone(), &mut ctx).unwrap();
        assert_eq!(out.body[0], module.body[0]);
        assert_eq!(out.body[1], module.body[1]);
        let Stmt::Assign { value, .. } = &out.body[2] else {
            panic!("expected an assignment");
        };
        assert!(matches!(value.as_ref(), Expr::Call { .. }));
    }
}
