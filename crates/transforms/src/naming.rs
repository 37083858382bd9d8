//! Naming templates for generated identifiers.
//!
//! A template is literal text with placeholders: `{kind}` expands to the
//! symbol's kind tag, `{n}` to a counter kept per kind and `{counter}` to a
//! counter shared by all kinds. `{{` and `}}` produce literal braces.
use pyveil_core::names::{is_identifier, is_keyword};
use pyveil_utils::errors::TemplateError;
use std::collections::HashMap;
use std::fmt;

/// What a renamed symbol is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SymbolKind {
    Routine,
    Variable,
    Parameter,
    Type,
}

impl SymbolKind {
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Routine => "method",
            Self::Variable => "var",
            Self::Parameter => "arg",
            Self::Type => "class",
        }
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Kind,
    PerKind,
    Global,
}

/// Upper bound on re-evaluations while looking for an unused name.
const MAX_ATTEMPTS: usize = 100_000;

/// A parsed template plus its counters.
#[derive(Debug, Clone)]
pub struct NamingTemplate {
    source: String,
    segments: Vec<Segment>,
    per_kind: HashMap<SymbolKind, u64>,
    global: u64,
}

impl NamingTemplate {
    pub fn parse(template: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut text = String::new();
        let mut chars = template.char_indices().peekable();
        while let Some((pos, c)) = chars.next() {
            match c {
                '{' if chars.peek().map(|(_, c)| *c) == Some('{') => {
                    chars.next();
                    text.push('{');
                }
                '}' if chars.peek().map(|(_, c)| *c) == Some('}') => {
                    chars.next();
                    text.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some((_, '}')) => break,
                            Some((_, c)) if c != '{' => name.push(c),
                            _ => return Err(TemplateError::Unbalanced(pos)),
                        }
                    }
                    let segment = match name.as_str() {
                        "kind" => Segment::Kind,
                        "n" => Segment::PerKind,
                        "counter" => Segment::Global,
                        _ => return Err(TemplateError::UnknownPlaceholder(name)),
                    };
                    if !text.is_empty() {
                        segments.push(Segment::Text(std::mem::take(&mut text)));
                    }
                    segments.push(segment);
                }
                '}' => return Err(TemplateError::Unbalanced(pos)),
                c => text.push(c),
            }
        }
        if !text.is_empty() {
            segments.push(Segment::Text(text));
        }
        Ok(Self {
            source: template.to_owned(),
            segments,
            per_kind: HashMap::new(),
            global: 0,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    fn has_counter(&self) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, Segment::PerKind | Segment::Global))
    }

    /// Evaluates the template once for `kind`, advancing its counters.
    pub fn evaluate(&mut self, kind: SymbolKind) -> Result<String, TemplateError> {
        let n = self.per_kind.entry(kind).or_insert(0);
        let mut out = String::new();
        for s in &self.segments {
            match s {
                Segment::Text(t) => out.push_str(t),
                Segment::Kind => out.push_str(kind.tag()),
                Segment::PerKind => out.push_str(&n.to_string()),
                Segment::Global => out.push_str(&self.global.to_string()),
            }
        }
        *n += 1;
        self.global += 1;

        if !is_identifier(&out) {
            return Err(TemplateError::InvalidIdentifier(out));
        }
        if is_keyword(&out) {
            return Err(TemplateError::Keyword(out));
        }
        Ok(out)
    }

    /// Evaluates until the result is not `taken`.
    pub fn fresh(
        &mut self,
        kind: SymbolKind,
        mut taken: impl FnMut(&str) -> bool,
    ) -> Result<String, TemplateError> {
        let budget = if self.has_counter() { MAX_ATTEMPTS } else { 1 };
        for _ in 0..budget {
            let name = self.evaluate(kind)?;
            if !taken(&name) {
                return Ok(name);
            }
        }
        Err(TemplateError::Exhausted {
            template: self.source.clone(),
            attempts: budget,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_are_per_kind_and_global() {
        let mut t = NamingTemplate::parse("{kind}{n}_{counter}").unwrap();
        assert_eq!(t.evaluate(SymbolKind::Routine).unwrap(), "method0_0");
        assert_eq!(t.evaluate(SymbolKind::Variable).unwrap(), "var0_1");
        assert_eq!(t.evaluate(SymbolKind::Routine).unwrap(), "method1_2");
        assert_eq!(t.evaluate(SymbolKind::Type).unwrap(), "class0_3");
    }

    #[test]
    fn escapes_and_errors() {
        assert_eq!(
            NamingTemplate::parse("{{x}}").unwrap().segments,
            [Segment::Text("{x}".into())]
        );
        assert_eq!(
            NamingTemplate::parse("{nope}").unwrap_err(),
            TemplateError::UnknownPlaceholder("nope".into())
        );
        assert_eq!(
            NamingTemplate::parse("a{n").unwrap_err(),
            TemplateError::Unbalanced(1)
        );
        assert_eq!(
            NamingTemplate::parse("a}").unwrap_err(),
            TemplateError::Unbalanced(1)
        );
    }

    #[test]
    fn results_must_be_identifiers() {
        let mut t = NamingTemplate::parse("{n}x").unwrap();
        assert!(matches!(
            t.evaluate(SymbolKind::Variable),
            Err(TemplateError::InvalidIdentifier(_))
        ));
        let mut k = NamingTemplate::parse("class").unwrap();
        assert_eq!(
            k.evaluate(SymbolKind::Type),
            Err(TemplateError::Keyword("class".into()))
        );
    }

    #[test]
    fn fresh_skips_taken_names() {
        let mut t = NamingTemplate::parse("{kind}{n}").unwrap();
        let name = t
            .fresh(SymbolKind::Parameter, |n| n == "arg0" || n == "arg1")
            .unwrap();
        assert_eq!(name, "arg2");

        let mut fixed = NamingTemplate::parse("same").unwrap();
        assert!(matches!(
            fixed.fresh(SymbolKind::Variable, |_| true),
            Err(TemplateError::Exhausted { attempts: 1, .. })
        ));
    }
}
