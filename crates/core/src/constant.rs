//! Literal values carried by `Constant` nodes and by compiled units.
//!
//! Equality is structural and type-strict: `1`, `1.0` and `True` are three
//! different constants, and floats compare by bit pattern so `0.0 != -0.0`
//! and `nan == nan` (the same rules the compiler uses when it folds its own
//! constant table).
use num_bigint::{BigInt, Sign};
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// A Python literal value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(into = "RawConstant", try_from = "RawConstant")]
pub enum Constant {
    None,
    Ellipsis,
    Bool(bool),
    Int(BigInt),
    Float(f64),
    Complex { real: f64, imag: f64 },
    Str(String),
    Bytes(Vec<u8>),
}

impl PartialEq for Constant {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::None, Self::None) | (Self::Ellipsis, Self::Ellipsis) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (
                Self::Complex { real: ar, imag: ai },
                Self::Complex { real: br, imag: bi },
            ) => ar.to_bits() == br.to_bits() && ai.to_bits() == bi.to_bits(),
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Bytes(a), Self::Bytes(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Constant {}

impl Constant {
    /// Name of the runtime type of this literal, as `type(v).__name__` reports it.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::None => "NoneType",
            Self::Ellipsis => "ellipsis",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Complex { .. } => "complex",
            Self::Str(_) => "str",
            Self::Bytes(_) => "bytes",
        }
    }

    pub fn int(v: impl Into<BigInt>) -> Self {
        Self::Int(v.into())
    }

    pub fn str(s: impl Into<String>) -> Self {
        Self::Str(s.into())
    }

    pub const fn is_str_or_bytes(&self) -> bool {
        matches!(self, Self::Str(_) | Self::Bytes(_))
    }

    /// Renders the value the way `repr()` does on the host runtime.
    ///
    /// Exact for `None`, `Ellipsis`, booleans, integers, bytes and for strings
    /// whose characters are printable; floats use the shortest round-trip
    /// form, which matches the runtime for every finite value with a
    /// moderate exponent.
    pub fn repr(&self) -> String {
        match self {
            Self::None => "None".into(),
            Self::Ellipsis => "Ellipsis".into(),
            Self::Bool(true) => "True".into(),
            Self::Bool(false) => "False".into(),
            Self::Int(v) => v.to_string(),
            Self::Float(v) => float_repr(*v),
            Self::Complex { real, imag } => {
                if real.to_bits() == 0 {
                    format!("{}j", float_repr(*imag).trim_end_matches(".0"))
                } else {
                    let imag_s = float_repr(*imag);
                    let sign = if imag_s.starts_with('-') { "" } else { "+" };
                    format!(
                        "({}{sign}{}j)",
                        float_repr(*real).trim_end_matches(".0"),
                        imag_s.trim_end_matches(".0")
                    )
                }
            }
            Self::Str(s) => str_repr(s),
            Self::Bytes(b) => bytes_repr(b),
        }
    }
}

fn float_repr(v: f64) -> String {
    if v.is_nan() {
        return "nan".into();
    }
    if v.is_infinite() {
        return if v > 0.0 { "inf".into() } else { "-inf".into() };
    }
    let s = format!("{v}");
    if s.contains('.') || s.contains('e') {
        s
    } else {
        format!("{s}.0")
    }
}

fn pick_quote(has_single: bool, has_double: bool) -> char {
    if has_single && !has_double { '"' } else { '\'' }
}

fn str_repr(s: &str) -> String {
    let quote = pick_quote(s.contains('\''), s.contains('"'));
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 || (0x7f..0xa0).contains(&(c as u32)) => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

fn bytes_repr(b: &[u8]) -> String {
    let quote = pick_quote(b.contains(&b'\''), b.contains(&b'"'));
    let mut out = String::with_capacity(b.len() + 3);
    out.push('b');
    out.push(quote);
    for &byte in b {
        match byte {
            b'\\' => out.push_str("\\\\"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            c if c as char == quote => {
                out.push('\\');
                out.push(c as char);
            }
            0x20..=0x7e => out.push(byte as char),
            _ => {
                let _ = write!(out, "\\x{byte:02x}");
            }
        }
    }
    out.push(quote);
    out
}

/// Wire form shared with the bridge program.
#[derive(Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum RawConstant {
    None,
    Ellipsis,
    Bool { value: bool },
    Int { value: String },
    Float { value: String },
    Complex { real: String, imag: String },
    Str { value: String },
    Bytes { value: String },
}

impl From<Constant> for RawConstant {
    fn from(c: Constant) -> Self {
        match c {
            Constant::None => Self::None,
            Constant::Ellipsis => Self::Ellipsis,
            Constant::Bool(value) => Self::Bool { value },
            Constant::Int(v) => Self::Int {
                value: v.to_string(),
            },
            Constant::Float(v) => Self::Float {
                value: float_repr(v),
            },
            Constant::Complex { real, imag } => Self::Complex {
                real: float_repr(real),
                imag: float_repr(imag),
            },
            Constant::Str(value) => Self::Str { value },
            Constant::Bytes(b) => Self::Bytes {
                value: hex::encode(b),
            },
        }
    }
}

impl TryFrom<RawConstant> for Constant {
    type Error = String;

    fn try_from(raw: RawConstant) -> Result<Self, Self::Error> {
        let float = |s: &str| {
            s.parse::<f64>()
                .map_err(|e| format!("bad float literal '{s}': {e}"))
        };
        Ok(match raw {
            RawConstant::None => Self::None,
            RawConstant::Ellipsis => Self::Ellipsis,
            RawConstant::Bool { value } => Self::Bool(value),
            RawConstant::Int { value } => Self::Int(
                value
                    .parse::<BigInt>()
                    .map_err(|e| format!("bad int literal '{value}': {e}"))?,
            ),
            RawConstant::Float { value } => Self::Float(float(&value)?),
            RawConstant::Complex { real, imag } => Self::Complex {
                real: float(&real)?,
                imag: float(&imag)?,
            },
            RawConstant::Str { value } => Self::Str(value),
            RawConstant::Bytes { value } => {
                Self::Bytes(hex::decode(&value).map_err(|e| format!("bad bytes literal: {e}"))?)
            }
        })
    }
}

/// Minimal little-endian byte length of `v`, counting a sign bit only for
/// negative values.
pub fn minimal_byte_len(v: &BigInt) -> usize {
    let negative = v.sign() == Sign::Minus;
    let bits = if negative {
        // two's complement of -n needs bits(n - 1) magnitude bits
        (-v - 1u32).bits()
    } else {
        v.bits()
    };
    (bits as usize + usize::from(negative)).div_ceil(8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_type_strict() {
        assert_ne!(Constant::int(1), Constant::Float(1.0));
        assert_ne!(Constant::int(1), Constant::Bool(true));
        assert_ne!(Constant::Float(0.0), Constant::Float(-0.0));
        assert_eq!(Constant::Float(f64::NAN), Constant::Float(f64::NAN));
        assert_eq!(Constant::str("a"), Constant::str("a"));
        assert_ne!(Constant::str("a"), Constant::Bytes(b"a".to_vec()));
    }

    #[test]
    fn repr_matches_python() {
        assert_eq!(Constant::None.repr(), "None");
        assert_eq!(Constant::str("what'cha looking for?").repr(), "\"what'cha looking for?\"");
        assert_eq!(Constant::str("a'b\"c").repr(), "'a\\'b\"c'");
        assert_eq!(Constant::Bytes(vec![0, b'a', 0x97, b'\n']).repr(), "b'\\x00a\\x97\\n'");
        assert_eq!(Constant::int(-17).repr(), "-17");
        assert_eq!(Constant::Float(1.0).repr(), "1.0");
        assert_eq!(Constant::Float(0.5).repr(), "0.5");
    }

    #[test]
    fn byte_len_includes_sign_bit() {
        assert_eq!(minimal_byte_len(&BigInt::from(0)), 0);
        assert_eq!(minimal_byte_len(&BigInt::from(255)), 1);
        assert_eq!(minimal_byte_len(&BigInt::from(-128)), 1);
        assert_eq!(minimal_byte_len(&BigInt::from(-129)), 2);
        assert_eq!(minimal_byte_len(&BigInt::from(-300_000_000_000i64)), 5);
    }

    #[test]
    fn wire_form_round_trips() {
        for c in [
            Constant::None,
            Constant::Int("-123456789012345678901234567890".parse().unwrap()),
            Constant::Float(f64::INFINITY),
            Constant::Complex { real: 0.0, imag: 2.5 },
            Constant::Bytes((0..=255).collect()),
        ] {
            let json = serde_json::to_string(&c).unwrap();
            let back: Constant = serde_json::from_str(&json).unwrap();
            assert_eq!(back, c);
        }
    }
}
