//! Loader functions that rebuild a compiled unit one constructor field at a
//! time.
use indexmap::IndexSet;
use pyveil_core::ast::*;
use pyveil_core::build;
use pyveil_core::code::{CodeValue, CompiledUnit, Field, UnitArena, UnitId, FIELD_COUNT};
use rand::{rngs::StdRng, seq::SliceRandom, Rng};

const NAME_ALPHABET: [char; 4] = ['l', 'I', 'M', 'N'];
const NAME_LEN: usize = 32;

/// Effects that touch disjoint state, so every emission order is equivalent.
#[derive(Debug)]
pub struct IndependentEffects<T> {
    effects: Vec<T>,
}

impl<T> Default for IndependentEffects<T> {
    fn default() -> Self {
        Self {
            effects: Vec::new(),
        }
    }
}

impl<T> IndependentEffects<T> {
    pub fn push(&mut self, effect: T) {
        self.effects.push(effect);
    }

    pub fn last_mut(&mut self) -> Option<&mut T> {
        self.effects.last_mut()
    }

    /// The effects in a random order.
    pub fn shuffled(mut self, rng: &mut StdRng) -> Vec<T> {
        self.effects.shuffle(rng);
        self.effects
    }
}

/// `a = [*a[:start], values.., *a[start + len:]]`
#[derive(Debug)]
struct Splice {
    start: usize,
    values: Vec<Expr>,
}

fn slice(lower: Option<usize>, upper: Option<usize>) -> Expr {
    let bound = |i: usize| Box::new(build::int_lit(i as i64));
    Expr::subscript(
        Expr::name("a"),
        Expr::Slice {
            lower: lower.map(bound),
            upper: upper.map(bound),
            step: None,
        },
    )
}

impl Splice {
    fn into_stmt(self) -> Stmt {
        let end = self.start + self.values.len();
        let mut elts = vec![build::starred(slice(None, Some(self.start)))];
        elts.extend(self.values);
        elts.push(build::starred(slice(Some(end), None)));
        Stmt::Assign {
            targets: vec![Expr::store("a")],
            value: Box::new(build::list(elts)),
            type_comment: None,
        }
    }
}

/// A fresh name of 32 characters drawn from `lIMN`.
pub fn random_name(rng: &mut StdRng) -> String {
    (0..NAME_LEN)
        .map(|_| NAME_ALPHABET[rng.random_range(0..NAME_ALPHABET.len())])
        .collect()
}

fn unique_name(taken: &mut IndexSet<String>, rng: &mut StdRng) -> String {
    loop {
        let name = random_name(rng);
        if taken.insert(name.clone()) {
            return name;
        }
    }
}

/// Loader functions for a unit tree. Units without a loader are embedded
/// in their parent as serialized blobs.
#[derive(Debug)]
pub struct Loaders<'u> {
    arena: UnitArena<'u>,
    names: Vec<Option<String>>,
}

impl<'u> Loaders<'u> {
    /// One loader per unit.
    pub fn every_unit(root: &'u CompiledUnit, rng: &mut StdRng) -> Self {
        let arena = UnitArena::new(root);
        let mut taken = IndexSet::new();
        let names = arena
            .ids()
            .map(|_| Some(unique_name(&mut taken, rng)))
            .collect();
        Self { arena, names }
    }

    /// A loader for `root` only.
    pub fn root_only(root: &'u CompiledUnit, rng: &mut StdRng) -> Self {
        let arena = UnitArena::new(root);
        let mut names = vec![None; arena.len()];
        if let Some(slot) = names.last_mut() {
            *slot = Some(random_name(rng));
        }
        Self { arena, names }
    }

    fn name(&self, id: UnitId) -> Option<&str> {
        self.names.get(id.0).and_then(Option::as_deref)
    }

    /// `<root loader>()`
    pub fn root_call(&self) -> Option<Expr> {
        self.name(self.arena.root())
            .map(|n| Expr::call(Expr::name(n), vec![]))
    }

    /// Loader definitions, innermost unit first.
    pub fn definitions(&self, rng: &mut StdRng) -> Vec<Stmt> {
        self.arena
            .ids()
            .filter_map(|id| {
                let name = self.name(id)?;
                Some(self.loader(name, self.arena.get(id), rng))
            })
            .collect()
    }

    fn loader(&self, name: &str, unit: &CompiledUnit, rng: &mut StdRng) -> Stmt {
        let fields = unit.fields();
        let mut splices: IndependentEffects<Splice> = IndependentEffects::default();
        for (i, field) in fields.iter().enumerate() {
            let value = self.field(*field);
            match splices.last_mut() {
                Some(prev) if i > 0 && fields[i - 1] == *field => prev.values.push(value),
                _ => splices.push(Splice {
                    start: i,
                    values: vec![value],
                }),
            }
        }

        let mut body = vec![Stmt::assign(
            "a",
            Expr::BinOp {
                left: Box::new(build::list(vec![Expr::constant(Constant::None)])),
                op: Operator::Mult,
                right: Box::new(build::int_lit(FIELD_COUNT as i64)),
            },
        )];
        body.extend(splices.shuffled(rng).into_iter().map(Splice::into_stmt));
        let code_type = Expr::call(
            Expr::name("type"),
            vec![Expr::attr(Expr::name("b"), "__code__")],
        );
        body.push(Stmt::Return {
            value: Some(Box::new(Expr::call(
                code_type,
                vec![build::starred(Expr::name("a"))],
            ))),
        });
        build::function(name, body)
    }

    fn field(&self, field: Field<'_>) -> Expr {
        match field {
            Field::Int(v) => build::int_lit(i64::from(v)),
            Field::Bytes(b) => build::bytes_lit(b.to_vec()),
            Field::Str(s) => build::str_lit(s),
            Field::Names(names) => build::tuple(names.iter().map(|n| build::str_lit(n)).collect()),
            Field::Consts(values) => build::tuple(values.iter().map(|v| self.value(v)).collect()),
        }
    }

    fn value(&self, value: &CodeValue) -> Expr {
        match value {
            CodeValue::Const(c) => Expr::constant(c.clone()),
            CodeValue::Tuple(items) => build::tuple(items.iter().map(|v| self.value(v)).collect()),
            CodeValue::FrozenSet(items) => Expr::call(
                Expr::name("frozenset"),
                vec![build::tuple(items.iter().map(|v| self.value(v)).collect())],
            ),
            CodeValue::Code(unit) => match self.arena.id_of(unit).and_then(|id| self.name(id)) {
                Some(loader) => Expr::call(Expr::name(loader), vec![]),
                None => build::method_call(
                    build::import_module("marshal"),
                    "loads",
                    vec![build::bytes_lit(unit.marshal.clone())],
                ),
            },
        }
    }
}
