//! Compiled units as reported by the host runtime.
//!
//! A unit carries the eighteen fields the runtime's code-object constructor
//! takes, in constructor order, plus the unit's native serialized form.
//! Units nest through their constant tables.
use crate::constant::Constant;
use serde::{Deserialize, Serialize};

/// Number of positional arguments the code-object constructor takes.
pub const FIELD_COUNT: usize = 18;

/// Constructor-order field names.
pub const FIELD_NAMES: [&str; FIELD_COUNT] = [
    "co_argcount",
    "co_posonlyargcount",
    "co_kwonlyargcount",
    "co_nlocals",
    "co_stacksize",
    "co_flags",
    "co_code",
    "co_consts",
    "co_names",
    "co_varnames",
    "co_filename",
    "co_name",
    "co_qualname",
    "co_firstlineno",
    "co_linetable",
    "co_exceptiontable",
    "co_freevars",
    "co_cellvars",
];

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(bytes))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledUnit {
    pub co_argcount: u32,
    pub co_posonlyargcount: u32,
    pub co_kwonlyargcount: u32,
    pub co_nlocals: u32,
    pub co_stacksize: u32,
    pub co_flags: u32,
    #[serde(with = "hex_bytes")]
    pub co_code: Vec<u8>,
    pub co_consts: Vec<CodeValue>,
    pub co_names: Vec<String>,
    pub co_varnames: Vec<String>,
    pub co_filename: String,
    pub co_name: String,
    pub co_qualname: String,
    pub co_firstlineno: u32,
    #[serde(with = "hex_bytes")]
    pub co_linetable: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub co_exceptiontable: Vec<u8>,
    pub co_freevars: Vec<String>,
    pub co_cellvars: Vec<String>,
    /// `marshal.dumps` of the whole unit.
    #[serde(with = "hex_bytes")]
    pub marshal: Vec<u8>,
}

/// An entry of a unit's constant table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum CodeValue {
    Const(Constant),
    Tuple(Vec<CodeValue>),
    FrozenSet(Vec<CodeValue>),
    Code(Box<CompiledUnit>),
}

/// One constructor argument, borrowed from a unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Field<'a> {
    Int(u32),
    Bytes(&'a [u8]),
    Str(&'a str),
    Names(&'a [String]),
    Consts(&'a [CodeValue]),
}

impl CompiledUnit {
    /// The constructor arguments in order.
    pub fn fields(&self) -> [Field<'_>; FIELD_COUNT] {
        [
            Field::Int(self.co_argcount),
            Field::Int(self.co_posonlyargcount),
            Field::Int(self.co_kwonlyargcount),
            Field::Int(self.co_nlocals),
            Field::Int(self.co_stacksize),
            Field::Int(self.co_flags),
            Field::Bytes(&self.co_code),
            Field::Consts(&self.co_consts),
            Field::Names(&self.co_names),
            Field::Names(&self.co_varnames),
            Field::Str(&self.co_filename),
            Field::Str(&self.co_name),
            Field::Str(&self.co_qualname),
            Field::Int(self.co_firstlineno),
            Field::Bytes(&self.co_linetable),
            Field::Bytes(&self.co_exceptiontable),
            Field::Names(&self.co_freevars),
            Field::Names(&self.co_cellvars),
        ]
    }

    /// Units embedded directly in this unit's constant table, including
    /// those inside constant tuples.
    pub fn nested(&self) -> Vec<&Self> {
        fn collect<'a>(values: &'a [CodeValue], out: &mut Vec<&'a CompiledUnit>) {
            for v in values {
                match v {
                    CodeValue::Code(u) => out.push(u.as_ref()),
                    CodeValue::Tuple(items) | CodeValue::FrozenSet(items) => collect(items, out),
                    CodeValue::Const(_) => {}
                }
            }
        }
        let mut out = Vec::new();
        collect(&self.co_consts, &mut out);
        out
    }
}

/// Index of a unit inside a [`UnitArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId(pub usize);

/// Flat, innermost-first view of a unit tree.
#[derive(Debug)]
pub struct UnitArena<'a> {
    units: Vec<&'a CompiledUnit>,
}

impl<'a> UnitArena<'a> {
    /// Enumerates `root` and everything nested in it. Every unit appears
    /// after all units nested inside it; `root` is last.
    pub fn new(root: &'a CompiledUnit) -> Self {
        fn post_order<'a>(unit: &'a CompiledUnit, out: &mut Vec<&'a CompiledUnit>) {
            for child in unit.nested() {
                post_order(child, out);
            }
            out.push(unit);
        }
        let mut units = Vec::new();
        post_order(root, &mut units);
        Self { units }
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn root(&self) -> UnitId {
        UnitId(self.units.len().saturating_sub(1))
    }

    pub fn get(&self, id: UnitId) -> &'a CompiledUnit {
        self.units[id.0]
    }

    /// Ids in innermost-first order.
    pub fn ids(&self) -> impl Iterator<Item = UnitId> + '_ {
        (0..self.units.len()).map(UnitId)
    }

    /// Finds the id of a unit borrowed from this arena's tree.
    pub fn id_of(&self, unit: &CompiledUnit) -> Option<UnitId> {
        self.units
            .iter()
            .position(|u| std::ptr::eq(*u, unit))
            .map(UnitId)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn unit(name: &str, consts: Vec<CodeValue>) -> CompiledUnit {
        CompiledUnit {
            co_argcount: 0,
            co_posonlyargcount: 0,
            co_kwonlyargcount: 0,
            co_nlocals: 0,
            co_stacksize: 1,
            co_flags: 0,
            co_code: vec![0x97, 0x00, 0x64, 0x00, 0x53, 0x00],
            co_consts: consts,
            co_names: vec![],
            co_varnames: vec![],
            co_filename: String::new(),
            co_name: name.into(),
            co_qualname: name.into(),
            co_firstlineno: 1,
            co_linetable: vec![],
            co_exceptiontable: vec![],
            co_freevars: vec![],
            co_cellvars: vec![],
            marshal: vec![0xe3],
        }
    }

    #[test]
    fn arena_is_innermost_first() {
        let inner = unit("inner", vec![CodeValue::Const(Constant::None)]);
        let middle = unit("middle", vec![CodeValue::Code(Box::new(inner))]);
        let root = unit(
            "<module>",
            vec![
                CodeValue::Code(Box::new(middle)),
                CodeValue::Const(Constant::str("middle")),
            ],
        );
        let arena = UnitArena::new(&root);
        let names: Vec<_> = arena.ids().map(|id| arena.get(id).co_name.as_str()).collect();
        assert_eq!(names, ["inner", "middle", "<module>"]);
        assert_eq!(arena.get(arena.root()).co_name, "<module>");
        let nested = root.nested()[0];
        assert_eq!(arena.id_of(nested), Some(UnitId(1)));
    }

    #[test]
    fn fields_follow_constructor_order() {
        let u = unit("f", vec![]);
        let fields = u.fields();
        assert_eq!(fields.len(), FIELD_NAMES.len());
        assert_eq!(fields[6], Field::Bytes(&u.co_code));
        assert_eq!(fields[11], Field::Str("f"));
    }

    #[test]
    fn wire_form() {
        let u = unit("f", vec![CodeValue::Tuple(vec![CodeValue::Const(Constant::int(1))])]);
        let v = serde_json::to_value(&u).unwrap();
        assert_eq!(v["co_code"], "970064005300");
        assert_eq!(v["co_consts"][0]["kind"], "tuple");
        let back: CompiledUnit = serde_json::from_value(v).unwrap();
        assert_eq!(back, u);
    }
}
